use core::fmt;
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by all workers of one run. Advisory only.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pages: AtomicU64,
    records_scanned: AtomicU64,
    records_dropped: AtomicU64,
    fragments: AtomicU64,
    keys_created: AtomicU64,
    keys_merged: AtomicU64,
    batches: AtomicU64,
    scan_nanos: AtomicU64,
    reshape_nanos: AtomicU64,
    merge_nanos: AtomicU64,
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl PipelineMetrics {
    pub fn record_scan(&self, elapsed: Duration) {
        let _ignored = self.pages.fetch_add(1, Ordering::Relaxed);
        let _ignored = self.scan_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub fn record_reshape(&self, records: u64, dropped: u64, elapsed: Duration) {
        let _ignored = self.records_scanned.fetch_add(records, Ordering::Relaxed);
        let _ignored = self.records_dropped.fetch_add(dropped, Ordering::Relaxed);
        let _ignored = self
            .fragments
            .fetch_add(records.saturating_sub(dropped), Ordering::Relaxed);
        let _ignored = self.reshape_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub fn record_merge(&self, created: u64, merged: u64, elapsed: Duration) {
        let _ignored = self.keys_created.fetch_add(created, Ordering::Relaxed);
        let _ignored = self.keys_merged.fetch_add(merged, Ordering::Relaxed);
        let _ignored = self.batches.fetch_add(1, Ordering::Relaxed);
        let _ignored = self.merge_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    #[must_use]
    pub fn report(&self, partitions: usize, elapsed: Duration) -> PipelineReport {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        PipelineReport {
            partitions,
            pages: load(&self.pages),
            records_scanned: load(&self.records_scanned),
            records_dropped: load(&self.records_dropped),
            fragments: load(&self.fragments),
            keys_created: load(&self.keys_created),
            keys_merged: load(&self.keys_merged),
            batches: load(&self.batches),
            scan: Duration::from_nanos(load(&self.scan_nanos)),
            reshape: Duration::from_nanos(load(&self.reshape_nanos)),
            merge: Duration::from_nanos(load(&self.merge_nanos)),
            elapsed,
        }
    }
}

/// Summary of a finished run.
///
/// Stage durations are summed over all workers, so they can exceed `elapsed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub partitions: usize,
    pub pages: u64,
    pub records_scanned: u64,
    pub records_dropped: u64,
    pub fragments: u64,
    pub keys_created: u64,
    pub keys_merged: u64,
    pub batches: u64,
    pub scan: Duration,
    pub reshape: Duration,
    pub merge: Duration,
    pub elapsed: Duration,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "partitions:      {}", self.partitions)?;
        writeln!(f, "pages:           {}", self.pages)?;
        writeln!(f, "records scanned: {}", self.records_scanned)?;
        writeln!(f, "records dropped: {}", self.records_dropped)?;
        writeln!(f, "fragments:       {}", self.fragments)?;
        writeln!(f, "keys created:    {}", self.keys_created)?;
        writeln!(f, "keys merged:     {}", self.keys_merged)?;
        writeln!(f, "batches:         {}", self.batches)?;
        writeln!(f, "scan time:       {:?}", self.scan)?;
        writeln!(f, "reshape time:    {:?}", self.reshape)?;
        writeln!(f, "merge time:      {:?}", self.merge)?;
        write!(f, "elapsed:         {:?}", self.elapsed)
    }
}
