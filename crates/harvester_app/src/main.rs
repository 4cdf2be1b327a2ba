mod cli;
mod config;
mod run;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("harvester: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::InitConfig { path, force } => {
            let written = AppConfig::write_default(path, *force)?;
            eprintln!("wrote {}", written.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch(args) => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            args.apply(&mut config);
            engine_logging::initialize(cli.log.into(), cli.level(), &config.output_dir);

            // One session, one tab: everything runs on the current thread.
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let outcome = runtime.block_on(run::fetch(&config));
            run::finish(&config, &outcome)
        }
    }
}
