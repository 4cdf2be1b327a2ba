use std::process::ExitCode;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_core::{ContentFilter, PatternFilter, PostingRecord, StopReason};
use harvester_engine::{
    open_session, ChromiumSessionProvider, ChromiumSettings, ConfigError, ExportOptions,
    FailureEnvelope, HarvestError, HarvestGovernor, HarvestReport, HttpSessionProvider,
    HttpSettings, ListingSink, SuccessEnvelope,
};

use crate::config::{AppConfig, Backend};

/// Opens the session, harvests, and releases the browsing context on every path.
pub async fn fetch(config: &AppConfig) -> Result<HarvestReport, HarvestError> {
    let filter: Box<dyn ContentFilter> =
        Box::new(PatternFilter::from_config(&config.filter).map_err(ConfigError::from)?);
    let governor = HarvestGovernor::new(&config.engine, filter)?;
    let navigation_timeout = config.engine.navigation_timeout;

    match config.backend {
        Backend::Chromium => {
            let provider = ChromiumSessionProvider::new(ChromiumSettings {
                headless: config.headless,
                executable: config.chromium_executable.clone(),
                ..ChromiumSettings::default()
            });
            let mut ctx = open_session(
                &provider,
                &config.session_path,
                &config.auth,
                navigation_timeout,
            )
            .await?;
            let result = governor.harvest(&mut ctx).await;
            if let Err(err) = ctx.close().await {
                engine_warn!("browser did not close cleanly: {}", err);
            }
            result
        }
        Backend::Http => {
            let provider = HttpSessionProvider::new(HttpSettings {
                request_timeout: navigation_timeout,
                ..HttpSettings::default()
            });
            let mut ctx = open_session(
                &provider,
                &config.session_path,
                &config.auth,
                navigation_timeout,
            )
            .await?;
            governor.harvest(&mut ctx).await
        }
    }
}

/// Writes whatever records exist (full or partial), prints the envelope
/// on stdout and picks the process exit code.
pub fn finish(
    config: &AppConfig,
    outcome: &Result<HarvestReport, HarvestError>,
) -> anyhow::Result<ExitCode> {
    match outcome {
        Ok(report) => {
            write_listing(config, &report.records, Some(report.stop_reason))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&SuccessEnvelope::from_report(report))?
            );
        }
        Err(err) => {
            engine_error!("harvest failed ({}): {}", err.kind(), err);
            if let Some(path) = err.diagnostics() {
                engine_info!("diagnostics saved at {:?}", path);
            }
            if let HarvestError::Timeout { partial, .. } = err {
                if !partial.is_empty() {
                    write_listing(config, partial, None)?;
                }
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&FailureEnvelope::from_error(err))?
            );
        }
    }
    Ok(ExitCode::from(exit_status(outcome)))
}

fn write_listing(
    config: &AppConfig,
    records: &[PostingRecord],
    stop_reason: Option<StopReason>,
) -> anyhow::Result<()> {
    let sink = ListingSink::new(&config.output_dir, ExportOptions::default());
    let summary = sink.write(records, stop_reason, &Utc::now().to_rfc3339())?;
    engine_info!(
        "wrote {} records to {:?} and {:?}",
        summary.record_count,
        summary.text_path,
        summary.json_path
    );
    Ok(())
}

/// 0 on success, 2 when re-authenticating fixes it, 1 otherwise.
pub fn exit_status(outcome: &Result<HarvestReport, HarvestError>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(err) if err.status_code() == 401 => 2,
        Err(_) => 1,
    }
}
