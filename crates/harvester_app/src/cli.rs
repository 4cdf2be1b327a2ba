use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine_logging::LogDestination;
use log::LevelFilter;

use crate::config::{AppConfig, Backend, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Harvest filtered postings from an authenticated catalog",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// RON config file (default: ./harvester.ron if present)
    #[arg(short, long, global = true, env = "HARVESTER_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal, global = true)]
    pub log: LogTarget,
}

impl Cli {
    pub fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one harvest and print the response envelope on stdout
    Fetch(FetchArgs),

    /// Write a config file with every default spelled out
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Every flag overrides the matching config value when given.
#[derive(Args, Debug, Default)]
pub struct FetchArgs {
    /// Catalog search page to harvest
    #[arg(long, value_name = "URL")]
    pub root: Option<String>,

    /// Session cookie jar
    #[arg(long, value_name = "PATH", env = "HARVESTER_SESSION")]
    pub session: Option<PathBuf>,

    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    #[arg(long)]
    pub max_results: Option<usize>,

    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Rounds without new links before giving up
    #[arg(long)]
    pub stagnation: Option<u32>,

    /// Global harvest budget in seconds
    #[arg(long, value_name = "SECS")]
    pub budget: Option<u64>,

    /// Per-navigation timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub nav_timeout: Option<u64>,

    /// Topic A pattern (repeatable); replaces the configured set
    #[arg(long = "topic-a", value_name = "PATTERN")]
    pub topic_a: Vec<String>,

    /// Topic B pattern (repeatable); replaces the configured set
    #[arg(long = "topic-b", value_name = "PATTERN")]
    pub topic_b: Vec<String>,

    /// Where block and timeout captures are written
    #[arg(long, value_name = "DIR")]
    pub diagnostics: Option<PathBuf>,
}

impl FetchArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(root) = &self.root {
            config.engine.list_root_url = root.clone();
        }
        if let Some(session) = &self.session {
            config.session_path = session.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.headed {
            config.headless = false;
        }
        let limits = &mut config.engine.limits;
        if let Some(max_results) = self.max_results {
            limits.max_results = max_results;
        }
        if let Some(max_rounds) = self.max_rounds {
            limits.max_rounds = max_rounds;
        }
        if let Some(stagnation) = self.stagnation {
            limits.stagnation_threshold = stagnation;
        }
        if let Some(secs) = self.budget {
            config.engine.harvest_budget = Duration::from_secs(secs);
        }
        if let Some(secs) = self.nav_timeout {
            config.engine.navigation_timeout = Duration::from_secs(secs);
        }
        if !self.topic_a.is_empty() {
            config.filter.topic_a = self.topic_a.clone();
        }
        if !self.topic_b.is_empty() {
            config.filter.topic_b = self.topic_b.clone();
        }
        if let Some(dir) = &self.diagnostics {
            config.engine.diagnostics_dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "harvester",
            "fetch",
            "--root",
            "https://example.com/jobs/search/",
            "--max-results",
            "3",
            "--budget",
            "90",
            "--topic-a",
            "rust",
            "--topic-a",
            "go",
            "--headed",
            "--backend",
            "http",
        ])
        .unwrap();
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };

        let mut config = AppConfig::default();
        config.filter.topic_b = vec!["remote".into()];
        args.apply(&mut config);

        assert_eq!(config.engine.list_root_url, "https://example.com/jobs/search/");
        assert_eq!(config.engine.limits.max_results, 3);
        assert_eq!(config.engine.limits.max_rounds, 40);
        assert_eq!(config.engine.harvest_budget, Duration::from_secs(90));
        assert_eq!(config.filter.topic_a, vec!["rust", "go"]);
        assert_eq!(config.filter.topic_b, vec!["remote"]);
        assert!(!config.headless);
        assert_eq!(config.backend, Backend::Http);
    }

    #[test]
    fn verbosity_maps_to_levels() {
        let cli = Cli::try_parse_from(["harvester", "-vv", "init-config"]).unwrap();
        assert_eq!(cli.level(), LevelFilter::Trace);
    }
}
