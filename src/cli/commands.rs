//! CLI commands and argument parsing

use crate::config::RawConfig;
use crate::sink::SinkKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Incremental loader for the PokeAPI and Chess.com public APIs
#[derive(Parser, Debug)]
#[command(name = "pokechess-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Sink to load into
    #[arg(short, long, global = true, value_enum, default_value = "memory")]
    pub sink: SinkKind,

    /// Sink destination: DuckDB file or Parquet directory
    #[arg(short, long, global = true)]
    pub destination: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub settings: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the selected resources
    Run,

    /// Resolve and print the configuration without any network activity
    Validate,

    /// List the available resources
    Resources,

    /// Print stored cursors of the target dataset
    State {
        /// Forget the stored cursor of this resource
        #[arg(long)]
        reset: Option<String>,
    },
}

/// Configuration flags, the highest-precedence layer
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Resources to load (comma-separated)
    #[arg(short, long, global = true, value_delimiter = ',')]
    pub resources: Vec<String>,

    /// Maximum number of listed items for Pokemon resources
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub entity_limit: Option<i64>,

    /// Chess.com usernames (comma-separated)
    #[arg(short, long, global = true, value_delimiter = ',')]
    pub entities: Vec<String>,

    /// First month of game archives (YYYY/MM)
    #[arg(long, global = true)]
    pub start_period: Option<String>,

    /// Last month of game archives (YYYY/MM)
    #[arg(long, global = true)]
    pub end_period: Option<String>,

    /// Target dataset
    #[arg(long = "dataset", global = true)]
    pub target_dataset: Option<String>,

    /// Resources loaded at the same time
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub max_concurrent_resources: Option<i64>,

    /// PokeAPI base URL
    #[arg(long, global = true)]
    pub pokemon_base_url: Option<String>,

    /// Chess.com API base URL
    #[arg(long, global = true)]
    pub chess_base_url: Option<String>,
}

impl ConfigArgs {
    /// Flags as a config layer; unset flags stay unset
    pub fn to_raw(&self) -> RawConfig {
        let list = |values: &[String]| (!values.is_empty()).then(|| values.to_vec());

        RawConfig {
            resources: list(&self.resources),
            entity_limit: self.entity_limit.map(|n| n.to_string()),
            entities: list(&self.entities),
            start_period: self.start_period.clone(),
            end_period: self.end_period.clone(),
            target_dataset: self.target_dataset.clone(),
            pokemon_base_url: self.pokemon_base_url.clone(),
            chess_base_url: self.chess_base_url.clone(),
            max_concurrent_resources: self.max_concurrent_resources.map(|n| n.to_string()),
            ..RawConfig::default()
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_run_with_flags() {
        let cli = Cli::try_parse_from([
            "pokechess-pipeline",
            "run",
            "--resources",
            "berries,players_games",
            "--entities",
            "hikaru",
            "-e",
            "magnuscarlsen",
            "--start-period",
            "2024/01",
            "--end-period",
            "2024/03",
            "--sink",
            "duckdb",
            "--dataset",
            "warehouse",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.sink, SinkKind::Duckdb);
        assert_eq!(cli.format, OutputFormat::Json);

        let raw = cli.settings.to_raw();
        assert_eq!(
            raw.resources,
            Some(vec!["berries".to_string(), "players_games".to_string()])
        );
        assert_eq!(
            raw.entities,
            Some(vec!["hikaru".to_string(), "magnuscarlsen".to_string()])
        );
        assert_eq!(raw.target_dataset.as_deref(), Some("warehouse"));
        assert_eq!(raw.entity_limit, None);
    }

    #[test]
    fn test_parse_negative_limit_reaches_resolver() {
        let cli = Cli::try_parse_from([
            "pokechess-pipeline",
            "validate",
            "--resources",
            "berries",
            "--entity-limit",
            "-3",
        ])
        .unwrap();
        assert_eq!(cli.settings.to_raw().entity_limit.as_deref(), Some("-3"));
    }

    #[test]
    fn test_parse_state_reset() {
        let cli = Cli::try_parse_from([
            "pokechess-pipeline",
            "--sink",
            "parquet",
            "-d",
            "/tmp/out",
            "state",
            "--reset",
            "players_games",
        ])
        .unwrap();

        match cli.command {
            Commands::State { reset } => assert_eq!(reset.as_deref(), Some("players_games")),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.destination, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_unset_flags_leave_layer_empty() {
        let cli = Cli::try_parse_from(["pokechess-pipeline", "resources"]).unwrap();
        assert_eq!(cli.settings.to_raw(), RawConfig::default());
    }
}
