//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::{ConfigResolver, ExecutionContext, RawConfig};
use crate::error::{Error, Result};
use crate::pipeline::{PipelineRunner, RunReport};
use crate::resource::ResourceRegistry;
use crate::sink::{self, Sink};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

/// Exit code of a run whose configuration was rejected
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// CLI runner
pub struct Runner {
    cli: Cli,
    registry: ResourceRegistry,
    abort: Arc<AtomicBool>,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            registry: ResourceRegistry::builtin(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops a running load before its next batch
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Run the CLI command, returning the process exit code
    pub async fn run(&self) -> Result<i32> {
        match &self.cli.command {
            Commands::Run => self.load().await,
            Commands::Validate => self.validate(),
            Commands::Resources => self.resources(),
            Commands::State { reset } => self.state(reset.as_deref()).await,
        }
    }

    /// Environment, then config file, then flags
    fn raw_config(&self) -> Result<RawConfig> {
        let mut raw = RawConfig::from_env();
        if let Some(path) = &self.cli.config {
            debug!(path = %path.display(), "Loading config file");
            raw = raw.merge(RawConfig::from_file(path)?);
        }
        Ok(raw.merge(self.cli.settings.to_raw()))
    }

    fn resolve(&self) -> Result<ExecutionContext> {
        ConfigResolver::new(self.registry).resolve(&self.raw_config()?)
    }

    fn open_sink(&self) -> Result<Arc<dyn Sink>> {
        sink::open(self.cli.sink, self.cli.destination.clone())
    }

    /// Load the selected resources
    async fn load(&self) -> Result<i32> {
        let context = self.resolve()?;
        let sink = self.open_sink()?;

        let runner = PipelineRunner::new(context, sink)?.with_abort(self.abort_handle());
        let report = runner.run().await;

        for resource in &report.resources {
            self.output_message(&json!({
                "type": "RESOURCE",
                "report": resource,
            }));
        }
        self.output_message(&json!({
            "type": "SUMMARY",
            "summary": summary(&report),
        }));

        if let Some((resource, error)) = report.first_error() {
            eprintln!("Error: resource '{resource}' did not complete: {error}");
        }

        Ok(report.exit_code())
    }

    /// Resolve the configuration and print it
    fn validate(&self) -> Result<i32> {
        let context = self.resolve()?;

        self.output_message(&json!({
            "type": "CONFIG",
            "config": context.describe(),
        }));

        Ok(0)
    }

    /// List the registry
    fn resources(&self) -> Result<i32> {
        let resources: Vec<Value> = self.registry.all().iter().map(|r| r.describe()).collect();

        self.output_message(&json!({
            "type": "RESOURCES",
            "resources": resources,
        }));

        Ok(0)
    }

    /// Print or reset stored cursors
    async fn state(&self, reset: Option<&str>) -> Result<i32> {
        let dataset = ConfigResolver::new(self.registry).resolve_dataset(&self.raw_config()?)?;
        let sink = self.open_sink()?;

        if let Some(name) = reset {
            let resource = self.registry.get(name)?.name;
            let cleared = sink.clear_cursor(&dataset, resource).await?;
            self.output_message(&json!({
                "type": "STATE_RESET",
                "dataset": dataset,
                "resource": resource,
                "cleared": cleared,
            }));
            return Ok(0);
        }

        let cursors = sink.cursors(&dataset).await?;
        self.output_message(&json!({
            "type": "STATE",
            "dataset": dataset,
            "sink": sink.name(),
            "resources": cursors,
        }));

        Ok(0)
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Exit code for an error that ended the command
pub fn exit_code_for(error: &Error) -> i32 {
    if error.is_configuration() {
        EXIT_CONFIG_ERROR
    } else {
        1
    }
}

fn summary(report: &RunReport) -> Value {
    let count = |status: &str| {
        report
            .resources
            .iter()
            .filter(|r| r.status.as_str() == status)
            .count()
    };

    json!({
        "status": if report.succeeded() { "SUCCEEDED" } else { "FAILED" },
        "dataset": report.dataset,
        "sink": report.sink,
        "total_rows": report.total_rows(),
        "total_resources": report.resources.len(),
        "successful_resources": count("success"),
        "partial_resources": count("partial"),
        "failed_resources": count("failed"),
        "first_error": report.first_error().map(|(resource, e)| json!({
            "resource": resource,
            "category": e.category,
            "message": e.message,
        })),
        "duration_ms": report.duration_ms,
    })
}
