//! Wiring of scanners and merge writers for one run.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::destination::FlowStore;
use crate::error::PipelineError;
use crate::metrics::{PipelineMetrics, PipelineReport};
use crate::partition::RangePartitioner;
use crate::reshape::{reshape, Accumulation};
use crate::scanner::{RangeScanner, MIN_SCAN_LIMIT};
use crate::schema::SchemaRegistry;
use crate::source::SourceStore;
use crate::writer::{Inbox, MergeWriter};

/// How accumulations are routed from scanners to writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// One queue shared by every writer. Two writers may merge the same key
    /// concurrently, in which case one of the fragments is lost.
    #[default]
    Shared,
    /// One queue per writer; a key is always merged by the same writer.
    Keyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub partitions: usize,
    pub writers: usize,
    pub scan_limit: usize,
    pub queue_depth: usize,
    pub dispatch: Dispatch,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            writers: 4,
            scan_limit: 10_000,
            queue_depth: 64,
            dispatch: Dispatch::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.partitions == 0 {
            return Err(PipelineError::Config("partitions must be at least 1".to_owned()));
        }

        if self.writers == 0 {
            return Err(PipelineError::Config("writers must be at least 1".to_owned()));
        }

        if self.scan_limit < MIN_SCAN_LIMIT {
            return Err(PipelineError::Config(format!(
                "scan_limit must be at least {MIN_SCAN_LIMIT}"
            )));
        }

        if self.queue_depth == 0 {
            return Err(PipelineError::Config("queue_depth must be at least 1".to_owned()));
        }

        Ok(())
    }
}

/// Sending half of the scanner-to-writer queues.
#[derive(Clone, Debug)]
enum Outbox {
    Shared(mpsc::Sender<Accumulation>),
    Keyed(Vec<mpsc::Sender<Accumulation>>),
}

impl Outbox {
    async fn send(&self, acc: Accumulation) -> Result<(), PipelineError> {
        if acc.is_empty() {
            return Ok(());
        }

        match self {
            Self::Shared(tx) => tx
                .send(acc)
                .await
                .map_err(|_| PipelineError::QueueClosed("merge")),
            Self::Keyed(txs) => {
                for (tx, part) in txs.iter().zip(acc.split(txs.len())) {
                    if part.is_empty() {
                        continue;
                    }

                    tx.send(part)
                        .await
                        .map_err(|_| PipelineError::QueueClosed("merge"))?;
                }

                Ok(())
            }
        }
    }
}

pub struct Pipeline<S> {
    source: Arc<S>,
    destination: FlowStore,
    registry: Arc<SchemaRegistry>,
    config: PipelineConfig,
}

impl<S> core::fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: SourceStore> Pipeline<S> {
    pub fn new(
        source: Arc<S>,
        destination: FlowStore,
        registry: Arc<SchemaRegistry>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            source,
            destination,
            registry,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Re-keys every record in `[start, end]` into the destination.
    ///
    /// The first fatal error cancels all remaining work and is returned.
    /// Batches committed before the failure stay committed.
    pub async fn run(&self, start: &str, end: &str) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();

        let partitions = RangePartitioner::new(self.config.partitions)?.split(start, end)?;
        let partition_count = partitions.len();

        info!(
            start,
            end,
            partitions = partition_count,
            writers = self.config.writers,
            dispatch = ?self.config.dispatch,
            "starting pipeline"
        );

        let metrics = Arc::new(PipelineMetrics::default());
        let mut tasks = JoinSet::new();

        let outbox = self.spawn_writers(&mut tasks, &metrics);

        for partition in partitions {
            debug!(%partition, "spawning scanner");

            let scanner =
                RangeScanner::new(Arc::clone(&self.source), partition, self.config.scan_limit);

            let _handle = tasks.spawn(produce(
                scanner,
                Arc::clone(&self.registry),
                outbox.clone(),
                Arc::clone(&metrics),
            ));
        }

        // Writers stop once the last scanner drops its sender.
        drop(outbox);

        let mut closed = None;

        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(()) => {}
                Err(PipelineError::QueueClosed(queue)) => {
                    // The writer that closed it fails with the underlying cause.
                    let _ignored = closed.get_or_insert(queue);
                }
                Err(err) => {
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        if let Some(queue) = closed {
            return Err(PipelineError::QueueClosed(queue));
        }

        let report = metrics.report(partition_count, started.elapsed());

        info!(
            records = report.records_scanned,
            dropped = report.records_dropped,
            created = report.keys_created,
            merged = report.keys_merged,
            elapsed = ?report.elapsed,
            "pipeline finished"
        );

        Ok(report)
    }

    fn spawn_writers(
        &self,
        tasks: &mut JoinSet<Result<(), PipelineError>>,
        metrics: &Arc<PipelineMetrics>,
    ) -> Outbox {
        let writer = |id| MergeWriter::new(id, self.destination.clone(), Arc::clone(metrics));
        let depth = self.config.queue_depth;

        match self.config.dispatch {
            Dispatch::Shared => {
                let (tx, rx) = mpsc::channel(depth);
                let rx = Arc::new(Mutex::new(rx));

                for id in 0..self.config.writers {
                    let inbox = Inbox::Shared(Arc::clone(&rx));
                    let _handle = tasks.spawn(drain(writer(id), inbox));
                }

                Outbox::Shared(tx)
            }
            Dispatch::Keyed => {
                let mut txs = Vec::with_capacity(self.config.writers);

                for id in 0..self.config.writers {
                    let (tx, rx) = mpsc::channel(depth);
                    txs.push(tx);

                    let _handle = tasks.spawn(drain(writer(id), Inbox::Owned(rx)));
                }

                Outbox::Keyed(txs)
            }
        }
    }
}

async fn drain(writer: MergeWriter, inbox: Inbox) -> Result<(), PipelineError> {
    let _batches = writer.run(inbox).await?;

    Ok(())
}

async fn produce<S: SourceStore>(
    mut scanner: RangeScanner<S>,
    registry: Arc<SchemaRegistry>,
    outbox: Outbox,
    metrics: Arc<PipelineMetrics>,
) -> Result<(), PipelineError> {
    loop {
        let scan_started = Instant::now();

        let Some(page) = scanner.next_page().await? else {
            break;
        };

        metrics.record_scan(scan_started.elapsed());

        let reshape_started = Instant::now();
        let acc = reshape(&page.records, &registry);
        metrics.record_reshape(acc.records(), acc.dropped(), reshape_started.elapsed());

        outbox.send(acc).await?;
    }

    debug!(partition = %scanner.partition(), "scanner finished");

    Ok(())
}
