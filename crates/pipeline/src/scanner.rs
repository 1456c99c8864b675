//! Paginated scanning of one partition.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::partition::Partition;
use crate::source::{KvPair, SourceStore};

/// Smallest usable page: a full page must leave at least one entry after its
/// boundary entry is held back.
pub const MIN_SCAN_LIMIT: usize = 2;

/// One deduplicated page of a partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub partition: usize,
    pub seq: u64,
    pub records: Vec<KvPair>,
}

/// Walks a partition page by page.
///
/// A full page holds back its last entry and resumes from that key, so the
/// entry is emitted exactly once as the head of the next page. The first short
/// page ends the scan, together with a point read of the partition's closing
/// key, which the half-open scan never returns.
#[derive(Debug)]
pub struct RangeScanner<S> {
    source: Arc<S>,
    partition: Partition,
    limit: usize,
    cursor: Vec<u8>,
    seq: u64,
    finished: bool,
}

impl<S: SourceStore> RangeScanner<S> {
    pub fn new(source: Arc<S>, partition: Partition, limit: usize) -> Self {
        let max = source.max_scan_limit().max(MIN_SCAN_LIMIT);
        let clamped = limit.clamp(MIN_SCAN_LIMIT, max);

        if clamped != limit {
            warn!(
                requested = limit,
                using = clamped,
                %partition,
                "scan limit out of range, clamping"
            );
        }

        Self {
            cursor: partition.scan_start(),
            source,
            partition,
            limit: clamped,
            seq: 0,
            finished: false,
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Next page, or `None` once the closing key has been read.
    pub async fn next_page(&mut self) -> Result<Option<Page>, PipelineError> {
        if self.finished {
            return Ok(None);
        }

        let end = self.partition.end().as_bytes();

        let mut records = self
            .source
            .scan(&self.cursor, end, self.limit)
            .await
            .map_err(|err| PipelineError::source_store("scan", err))?;

        if records.len() >= self.limit {
            records.truncate(self.limit);

            if let Some(boundary) = records.pop() {
                self.cursor = boundary.key;
            }
        } else {
            self.finished = true;

            let closing = self
                .source
                .get(end)
                .await
                .map_err(|err| PipelineError::source_store("get", err))?;

            if let Some(value) = closing {
                records.push(KvPair::new(end, value));
            }
        }

        let page = Page {
            partition: self.partition.index(),
            seq: self.seq,
            records,
        };

        debug!(
            partition = page.partition,
            seq = page.seq,
            records = page.records.len(),
            last = self.finished,
            "scanned page"
        );

        self.seq += 1;

        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use eyre::{bail, Result as EyreResult};

    use super::*;
    use crate::partition::RangePartitioner;
    use crate::source::MemorySource;

    fn digits(n: usize) -> MemorySource {
        (0..n).map(|i| (format!("{i:03}"), format!("v{i}"))).collect()
    }

    async fn drain<S: SourceStore>(mut scanner: RangeScanner<S>) -> Vec<KvPair> {
        let mut out = Vec::new();
        while let Some(page) = scanner.next_page().await.unwrap() {
            out.extend(page.records);
        }
        out
    }

    async fn scan_all(
        source: MemorySource,
        start: &str,
        end: &str,
        parts: usize,
        limit: usize,
    ) -> Vec<Vec<u8>> {
        let source = Arc::new(source);
        let mut keys = Vec::new();

        for partition in RangePartitioner::new(parts).unwrap().split(start, end).unwrap() {
            let scanner = RangeScanner::new(Arc::clone(&source), partition, limit);
            keys.extend(drain(scanner).await.into_iter().map(|kv| kv.key));
        }

        keys
    }

    #[tokio::test]
    async fn full_pages_do_not_repeat_boundary() {
        let source = Arc::new(digits(10));
        let partition = RangePartitioner::new(1).unwrap().split("000", "009").unwrap().remove(0);
        let mut scanner = RangeScanner::new(source, partition, 4);

        let mut sizes = Vec::new();
        let mut keys = Vec::new();
        while let Some(page) = scanner.next_page().await.unwrap() {
            sizes.push(page.records.len());
            keys.extend(page.records.into_iter().map(|kv| kv.key));
        }

        // pages of 3 + boundary carry-over, then a short page plus the closing key
        assert_eq!(sizes, vec![3, 3, 4]);
        let expected: Vec<_> = (0..10).map(|i| format!("{i:03}").into_bytes()).collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn partitions_cover_interval_exactly_once() {
        for parts in 1..=7 {
            for limit in [2, 3, 5, 100] {
                let keys = scan_all(digits(50), "000", "049", parts, limit).await;

                let expected: Vec<_> = (0..50).map(|i| format!("{i:03}").into_bytes()).collect();
                let unique: BTreeSet<_> = keys.iter().cloned().collect();

                assert_eq!(keys.len(), 50, "parts={parts} limit={limit}");
                assert_eq!(unique.into_iter().collect::<Vec<_>>(), expected);
            }
        }
    }

    #[tokio::test]
    async fn shared_boundaries_scanned_once() {
        let source: MemorySource = (0..10).map(|i| (i.to_string(), "x")).collect();

        let keys = scan_all(source, "0", "9", 3, 100).await;

        assert_eq!(keys.iter().filter(|k| k.as_slice() == b"3").count(), 1);
        assert_eq!(keys.iter().filter(|k| k.as_slice() == b"6").count(), 1);
        assert_eq!(keys.len(), 10);
    }

    #[tokio::test]
    async fn missing_closing_key_is_skipped() {
        let source: MemorySource = [("1", "a"), ("2", "b")].into_iter().collect();

        let keys = scan_all(source, "0", "5", 1, 10).await;

        assert_eq!(keys, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[tokio::test]
    async fn clamps_limit_to_adapter_range() {
        let partition = RangePartitioner::new(1).unwrap().split("0", "9").unwrap().remove(0);

        let big = RangeScanner::new(
            Arc::new(MemorySource::new().with_max_scan_limit(16)),
            partition.clone(),
            10_000,
        );
        assert_eq!(big.limit(), 16);

        let small = RangeScanner::new(Arc::new(MemorySource::new()), partition, 1);
        assert_eq!(small.limit(), MIN_SCAN_LIMIT);
    }

    struct BrokenSource;

    #[async_trait]
    impl SourceStore for BrokenSource {
        async fn scan(&self, _start: &[u8], _end: &[u8], _limit: usize) -> EyreResult<Vec<KvPair>> {
            bail!("region unavailable")
        }

        async fn get(&self, _key: &[u8]) -> EyreResult<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn source_failure_is_fatal() {
        let partition = RangePartitioner::new(1).unwrap().split("0", "9").unwrap().remove(0);
        let mut scanner = RangeScanner::new(Arc::new(BrokenSource), partition, 10);

        let err = scanner.next_page().await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Store {
                side: crate::error::StoreSide::Source,
                op: "scan",
                ..
            }
        ));
    }
}
