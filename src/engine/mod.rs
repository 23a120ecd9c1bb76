//! Iteration engine module
//!
//! Turns a resource's strategy into a lazy sequence of row batches.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ResourceIterator` - Walks one resource unit by unit, resuming from a cursor
//! - `RowBatch` - Normalized rows of one unit plus the cursor that follows it
//! - `UnitFailure` - A unit that failed without ending the iteration
//!
//! Flat-paginated resources stop at the first failed page, since later
//! pages could not be checkpointed past it. Per-entity resources carry on
//! with the next entity. Date-windowed resources skip the remaining months
//! of the failed entity and carry on with the next one.

mod types;

pub use types::{IterationScope, IterationStats, RowBatch, Unit, UnitFailure};

use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{ListingPage, OffsetPaginator, PageRequest, PaginationState};
use crate::partition::{ListRouter, MonthWindowRouter, Partition, PartitionRouter};
use crate::resource::{MapContext, ResourceDescriptor, Strategy};
use crate::state::Cursor;
use crate::template::{self, TemplateContext};
use crate::types::{Row, WriteDisposition};
use futures::stream::{self, Stream};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Iteration plan derived from the strategy
enum Plan {
    Pages {
        list_endpoint: &'static str,
        detail_endpoint: &'static str,
        paginator: OffsetPaginator,
        state: PaginationState,
    },
    Partitions {
        endpoint: &'static str,
        windowed: bool,
        pending: VecDeque<Partition>,
        failed_entities: HashSet<String>,
    },
}

/// Lazy, finite iteration over one resource
pub struct ResourceIterator {
    descriptor: &'static ResourceDescriptor,
    client: Arc<HttpClient>,
    scope: IterationScope,
    plan: Plan,
    /// Cursor after the last emitted batch
    cursor: Cursor,
    stats: IterationStats,
}

impl ResourceIterator {
    /// Create an iterator resuming after `resume`
    ///
    /// Fails with a state error when the stored cursor does not fit the
    /// resource's strategy.
    pub fn new(
        descriptor: &'static ResourceDescriptor,
        client: Arc<HttpClient>,
        scope: IterationScope,
        resume: Option<Cursor>,
    ) -> Result<Self> {
        let expected = match descriptor.strategy {
            Strategy::FlatPaginated { .. } => "page",
            Strategy::PerEntity { .. } => "entities",
            Strategy::DateWindowed { .. } => "windows",
        };
        if let Some(cursor) = &resume {
            if cursor.kind() != expected {
                return Err(Error::state(format!(
                    "stored cursor for '{}' is a {} cursor, expected {expected}",
                    descriptor.name,
                    cursor.kind()
                )));
            }
        }

        let (plan, cursor) = match descriptor.strategy {
            Strategy::FlatPaginated {
                list_endpoint,
                detail_endpoint,
                page_size,
            } => {
                let offset = resume.as_ref().and_then(Cursor::offset).unwrap_or(0);
                let plan = Plan::Pages {
                    list_endpoint,
                    detail_endpoint,
                    paginator: OffsetPaginator::new(page_size, scope.entity_limit),
                    state: PaginationState::starting_at(offset),
                };
                (plan, Cursor::page(offset))
            }
            Strategy::PerEntity { endpoint } => {
                let router = ListRouter::new(scope.entities.clone()).resume_from(resume.as_ref());
                log_skipped(descriptor.name, &router);
                let plan = Plan::Partitions {
                    endpoint,
                    windowed: false,
                    pending: router.partitions().into(),
                    failed_entities: HashSet::new(),
                };
                (plan, resume.unwrap_or_else(Cursor::no_entities))
            }
            Strategy::DateWindowed { endpoint } => {
                let router = MonthWindowRouter::new(scope.entities.clone(), scope.start, scope.end)
                    .resume_from(resume.as_ref());
                log_skipped(descriptor.name, &router);
                let plan = Plan::Partitions {
                    endpoint,
                    windowed: true,
                    pending: router.partitions().into(),
                    failed_entities: HashSet::new(),
                };
                (plan, resume.unwrap_or_else(Cursor::no_windows))
            }
        };

        Ok(Self {
            descriptor,
            client,
            scope,
            plan,
            cursor,
            stats: IterationStats::default(),
        })
    }

    /// Resource being iterated
    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    /// Counters so far
    pub fn stats(&self) -> &IterationStats {
        &self.stats
    }

    /// Produce the next batch, a unit failure, or `None` when done
    pub async fn next_batch(&mut self) -> Option<std::result::Result<RowBatch, UnitFailure>> {
        let item = match self.plan {
            Plan::Pages { .. } => self.next_page().await?,
            Plan::Partitions { .. } => self.next_partition().await?,
        };

        match &item {
            Ok(batch) => self.stats.add_batch(batch.len()),
            Err(failure) => {
                self.stats.add_failure();
                warn!(resource = self.descriptor.name, "{failure}");
            }
        }
        Some(item)
    }

    /// Consume the iterator as a stream
    pub fn into_stream(self) -> impl Stream<Item = std::result::Result<RowBatch, UnitFailure>> {
        stream::unfold(self, |mut iter| async move {
            let item = iter.next_batch().await?;
            Some((item, iter))
        })
    }

    // ------------------------------------------------------------------------
    // Flat pagination
    // ------------------------------------------------------------------------

    async fn next_page(&mut self) -> Option<std::result::Result<RowBatch, UnitFailure>> {
        let Plan::Pages {
            list_endpoint,
            detail_endpoint,
            paginator,
            state,
        } = &self.plan
        else {
            return None;
        };
        let request = paginator.next_request(state)?;
        let (list_endpoint, detail_endpoint) = (*list_endpoint, *detail_endpoint);
        let unit = Unit::Page {
            offset: request.offset,
            limit: request.limit,
        };

        let fetched = self.fetch_page(list_endpoint, detail_endpoint, &request).await;

        let Plan::Pages {
            paginator, state, ..
        } = &mut self.plan
        else {
            return None;
        };

        match fetched {
            Ok((page, rows)) => {
                paginator.process_page(&request, &page, state);
                if page.names.is_empty() {
                    return None;
                }
                self.cursor = Cursor::page(state.offset);
                debug!(
                    resource = self.descriptor.name,
                    offset = request.offset,
                    rows = rows.len(),
                    "Page fetched"
                );
                Some(Ok(RowBatch::new(
                    self.descriptor.name,
                    unit,
                    rows,
                    Some(self.cursor.clone()),
                )))
            }
            Err(error) => {
                state.mark_done();
                Some(Err(UnitFailure { unit, error }))
            }
        }
    }

    /// Fetch one listing page and the details of its items
    async fn fetch_page(
        &mut self,
        list_endpoint: &str,
        detail_endpoint: &str,
        request: &PageRequest,
    ) -> Result<(ListingPage, Vec<Row>)> {
        let query = request
            .query()
            .into_iter()
            .fold(RequestConfig::new(), |config, (k, v)| config.query(k, v));

        self.stats.requests += 1;
        let response = self.client.fetch(list_endpoint, query).await?;
        let mut page = ListingPage::from_json(&response.body)?;
        page.truncate(request.limit);

        let ctx = MapContext::new(self.scope.checked_at);
        let mut rows = Vec::with_capacity(page.names.len());
        for name in &page.names {
            let url = template::render(detail_endpoint, &TemplateContext::new().with("name", name.as_str()))?;
            self.stats.requests += 1;
            let detail = self.client.get_json(&url).await?;
            rows.extend(self.descriptor.map_rows(&detail, &ctx)?);
        }

        Ok((page, rows))
    }

    // ------------------------------------------------------------------------
    // Entities and months
    // ------------------------------------------------------------------------

    async fn next_partition(&mut self) -> Option<std::result::Result<RowBatch, UnitFailure>> {
        let Plan::Partitions {
            endpoint,
            windowed,
            pending,
            failed_entities,
        } = &mut self.plan
        else {
            return None;
        };
        let (endpoint, windowed) = (*endpoint, *windowed);

        let partition = loop {
            let next = pending.pop_front()?;
            if failed_entities.contains(&next.entity) {
                self.stats.skipped += 1;
                debug!(resource = self.descriptor.name, partition = %next, "Skipped after earlier failure");
                continue;
            }
            break next;
        };
        let unit = match partition.month {
            Some(month) => Unit::Month {
                entity: partition.entity.clone(),
                month,
            },
            None => Unit::Entity {
                entity: partition.entity.clone(),
            },
        };

        match self.fetch_partition(endpoint, windowed, &partition).await {
            Ok(rows) => {
                let cursor = self.advance_cursor(&partition);
                debug!(
                    resource = self.descriptor.name,
                    partition = %partition,
                    rows = rows.len(),
                    "Partition fetched"
                );
                Some(Ok(RowBatch::new(self.descriptor.name, unit, rows, cursor)))
            }
            Err(error) => {
                if windowed {
                    if let Plan::Partitions {
                        failed_entities, ..
                    } = &mut self.plan
                    {
                        failed_entities.insert(partition.entity.clone());
                    }
                }
                Some(Err(UnitFailure { unit, error }))
            }
        }
    }

    async fn fetch_partition(
        &mut self,
        endpoint: &str,
        windowed: bool,
        partition: &Partition,
    ) -> Result<Vec<Row>> {
        let url = template::render(endpoint, &partition.template_context())?;

        self.stats.requests += 1;
        let body = match self.client.get_json(&url).await {
            Ok(body) => body,
            Err(Error::NotFound { .. }) if windowed => {
                debug!(resource = self.descriptor.name, partition = %partition, "No archive for month");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        self.descriptor
            .map_rows(&body, &partition.map_context(self.scope.checked_at))
    }

    /// Cursor following a successful partition
    ///
    /// `None` for open months and for append-only snapshot resources,
    /// which are taken again on every run.
    fn advance_cursor(&mut self, partition: &Partition) -> Option<Cursor> {
        if self.descriptor.write_disposition() == WriteDisposition::Append {
            return None;
        }
        let next = match partition.month {
            Some(month) if month >= self.scope.reference_month => return None,
            Some(month) => self.cursor.with_window(&partition.entity, month),
            None => self.cursor.with_entity(&partition.entity),
        };
        self.cursor = next.clone();
        Some(next)
    }
}

impl std::fmt::Debug for ResourceIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceIterator")
            .field("resource", &self.descriptor.name)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn log_skipped(resource: &str, router: &dyn PartitionRouter) {
    let skipped = router.skipped();
    if skipped > 0 {
        debug!(resource, skipped, "Partitions covered by stored cursor");
    }
}
