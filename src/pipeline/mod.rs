//! Pipeline runner
//!
//! Drives every selected resource from its resume point to the end of its
//! iteration, forwarding batches to the sink and checkpointing after each
//! accepted batch.
//!
//! # Isolation
//!
//! A failing resource is reported and the run moves on; data and cursors
//! committed by other resources stay in place. A sink or checkpoint error
//! stops the resource at once, so a cursor is never saved ahead of the rows
//! it covers.

mod types;

pub use types::{ReportedError, ResourceReport, ResourceStatus, RunReport};

use crate::config::ExecutionContext;
use crate::engine::ResourceIterator;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::resource::ResourceDescriptor;
use crate::sink::Sink;
use crate::state::StateTracker;
use crate::types::Source;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Runs one execution context against one sink
pub struct PipelineRunner {
    context: ExecutionContext,
    sink: Arc<dyn Sink>,
    tracker: StateTracker,
    clients: HashMap<Source, Arc<HttpClient>>,
    abort: Arc<AtomicBool>,
}

impl PipelineRunner {
    /// Create a runner with one HTTP client per source
    pub fn new(context: ExecutionContext, sink: Arc<dyn Sink>) -> Result<Self> {
        let mut clients = HashMap::new();
        for descriptor in &context.resources {
            if !clients.contains_key(&descriptor.source) {
                let client = context.http_client(descriptor.source)?;
                clients.insert(descriptor.source, Arc::new(client));
            }
        }

        Ok(Self {
            tracker: StateTracker::new(Arc::clone(&sink), context.target_dataset.clone()),
            context,
            sink,
            clients,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned abort flag
    #[must_use]
    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    /// Flag that stops every resource before its next batch once set
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Context being run
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Run every selected resource
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let concurrency = self.context.max_concurrent_resources.max(1);

        info!(
            resources = ?self.context.resource_names(),
            dataset = %self.context.target_dataset,
            sink = self.sink.name(),
            concurrency,
            "Starting run"
        );

        let resources: Vec<ResourceReport> = stream::iter(self.context.resources.iter().copied())
            .map(|descriptor| self.run_resource(descriptor))
            .buffered(concurrency)
            .collect()
            .await;

        let report = RunReport {
            dataset: self.context.target_dataset.clone(),
            sink: self.sink.name(),
            resources,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            succeeded = report.succeeded(),
            rows = report.total_rows(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        report
    }

    /// Run one resource, never failing
    async fn run_resource(&self, descriptor: &'static ResourceDescriptor) -> ResourceReport {
        let started = Instant::now();
        let mut report = ResourceReport::new(descriptor.name);
        info!(resource = descriptor.name, "Loading resource");

        if let Err(e) = self.load(descriptor, &mut report).await {
            error!(resource = descriptor.name, error = %e, "Resource stopped");
            report.record_fatal(&e);
        }

        let report = report.finish(started.elapsed());
        info!(
            resource = descriptor.name,
            status = %report.status,
            rows = report.rows_loaded,
            units = report.units_processed,
            failed = report.units_failed,
            "Resource finished"
        );
        report
    }

    async fn load(
        &self,
        descriptor: &'static ResourceDescriptor,
        report: &mut ResourceReport,
    ) -> Result<()> {
        let table = descriptor.table(self.context.target_dataset.clone());
        self.sink.prepare(&table).await?;

        let resume = self.tracker.resume_point(descriptor.name).await?;
        let client = self.client(descriptor)?;
        let iterator = ResourceIterator::new(descriptor, client, self.context.scope(), resume)?;

        let batches = iterator.into_stream();
        futures::pin_mut!(batches);

        loop {
            if self.abort.load(Ordering::SeqCst) {
                return Err(Error::Aborted {
                    unit: format!(
                        "{}[{}]",
                        descriptor.name,
                        report.units_processed + report.units_failed
                    ),
                });
            }

            let Some(item) = batches.next().await else {
                break;
            };

            match item {
                Ok(batch) => {
                    let written = self.sink.accept(&table, &batch).await?;
                    if let Some(cursor) = batch.cursor() {
                        self.tracker.checkpoint(descriptor.name, cursor).await?;
                    }
                    report.record_batch(written);
                }
                Err(failure) => report.record_failure(&failure),
            }
        }

        Ok(())
    }

    fn client(&self, descriptor: &ResourceDescriptor) -> Result<Arc<HttpClient>> {
        self.clients
            .get(&descriptor.source)
            .cloned()
            .ok_or_else(|| Error::Other(format!("No HTTP client for source {}", descriptor.source)))
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("resources", &self.context.resource_names())
            .field("dataset", &self.context.target_dataset)
            .field("sink", &self.sink.name())
            .finish_non_exhaustive()
    }
}
