use std::path::{Path, PathBuf};

use harvester_core::{PostingRecord, StopReason};
use serde::Serialize;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::{ErrorClass, HarvestError, HarvestReport};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub text_filename: String,
    pub json_filename: String,
    pub delimiter_start: String,
    pub delimiter_end: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            text_filename: "listing.txt".to_string(),
            json_filename: "listing.json".to_string(),
            delimiter_start: "===== POSTING START =====".to_string(),
            delimiter_end: "===== POSTING END =====".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    pub text_path: PathBuf,
    pub json_path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonListing<'a> {
    harvested_utc: &'a str,
    stop_reason: Option<StopReason>,
    count: usize,
    records: &'a [PostingRecord],
}

/// Writes a harvest's records as a readable text listing plus a JSON listing.
pub struct ListingSink {
    writer: AtomicFileWriter,
    options: ExportOptions,
}

impl ListingSink {
    pub fn new(output_dir: &Path, options: ExportOptions) -> Self {
        Self {
            writer: AtomicFileWriter::new(output_dir.to_path_buf()),
            options,
        }
    }

    /// `stop_reason` is `None` for partial listings salvaged from a failed harvest.
    pub fn write(
        &self,
        records: &[PostingRecord],
        stop_reason: Option<StopReason>,
        harvested_utc: &str,
    ) -> Result<ExportSummary, ExportError> {
        let text = self.render_text(records, stop_reason, harvested_utc);
        let text_path = self.writer.write(&self.options.text_filename, &text)?;

        let json = serde_json::to_string_pretty(&JsonListing {
            harvested_utc,
            stop_reason,
            count: records.len(),
            records,
        })?;
        let json_path = self.writer.write(&self.options.json_filename, &json)?;

        Ok(ExportSummary {
            record_count: records.len(),
            text_path,
            json_path,
        })
    }

    pub fn render_text(
        &self,
        records: &[PostingRecord],
        stop_reason: Option<StopReason>,
        harvested_utc: &str,
    ) -> String {
        let mut buffer = format!(
            "harvested_utc: {}\nstop_reason: {}\ncount: {}\n\n",
            harvested_utc,
            stop_reason.map_or_else(|| "partial".to_string(), |r| r.to_string()),
            records.len()
        );
        for (index, record) in records.iter().enumerate() {
            buffer.push_str(&self.options.delimiter_start);
            buffer.push('\n');
            buffer.push_str(&format!(
                "#{}\ntitle: {}\norganization: {}\nposted: {}\nlink: {}\n\n",
                index + 1,
                or_dash(&record.title),
                or_dash(&record.organization),
                record.posted_date.as_deref().unwrap_or("-"),
                record.source_link
            ));
            buffer.push_str(record.description.trim_end());
            buffer.push('\n');
            buffer.push_str(&self.options.delimiter_end);
            buffer.push_str("\n\n");
        }
        buffer
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Success half of the request/response boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEnvelope<'a> {
    pub ok: bool,
    pub count: usize,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
    pub records: &'a [PostingRecord],
}

impl<'a> SuccessEnvelope<'a> {
    pub fn from_report(report: &'a HarvestReport) -> Self {
        Self {
            ok: true,
            count: report.records.len(),
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            stop_reason: report.stop_reason,
            records: &report.records,
        }
    }
}

/// Failure half of the request/response boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEnvelope {
    pub ok: bool,
    pub error: String,
    pub kind: &'static str,
    pub class: ErrorClass,
    pub status: u16,
}

impl FailureEnvelope {
    pub fn from_error(err: &HarvestError) -> Self {
        Self {
            ok: false,
            error: err.to_string(),
            kind: err.kind(),
            class: err.class(),
            status: err.status_code(),
        }
    }
}
