//! Loading raw record files into the local record store.
//!
//! Each non-blank line is one record: the first token is its key, the rest,
//! single-space joined, its value.

use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::{Utf8Path, Utf8PathBuf};
use flowkv_store::db::Column;
use flowkv_store::tx::Transaction;
use flowkv_store::Store;
use tokio::task::spawn_blocking;
use tracing::{debug, info};

use crate::error::PipelineError;

/// Records written per atomic batch.
pub const INGEST_BATCH_SIZE: usize = 1000;

const RECORD_EXTENSION: &str = "txt";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub records: u64,
    /// Lines holding a key but no value.
    pub skipped: u64,
}

fn io_error(path: &Utf8Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Every `*.txt` file under `dir`, recursively, in path order.
pub fn list_record_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, PipelineError> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_owned()];

    while let Some(dir) = pending.pop() {
        for entry in dir.read_dir_utf8().map_err(io_error(&dir))? {
            let entry = entry.map_err(io_error(&dir))?;
            let path = entry.path();

            let file_type = entry.file_type().map_err(io_error(path))?;

            if file_type.is_dir() {
                pending.push(path.to_owned());
            } else if path.extension() == Some(RECORD_EXTENSION) {
                files.push(path.to_owned());
            }
        }
    }

    files.sort();

    Ok(files)
}

/// Splits a line into `(key, value)`. `None` for blank or key-only lines.
///
/// Key-only lines are not stored. An empty value never matches a record
/// schema, so such a record could only be dropped later; [`ingest_file`]
/// counts them as skipped instead.
#[must_use]
pub fn parse_line(line: &str) -> Option<(&str, String)> {
    let mut tokens = line.split_whitespace();
    let key = tokens.next()?;
    let value = tokens.collect::<Vec<_>>().join(" ");

    if value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Writes the records of one file. Blocking.
pub fn ingest_file(store: &Store, path: &Utf8Path) -> Result<IngestSummary, PipelineError> {
    let reader = BufReader::new(File::open(path).map_err(io_error(path))?);

    let mut summary = IngestSummary {
        files: 1,
        ..IngestSummary::default()
    };
    let mut tx = Transaction::default();

    for line in reader.lines() {
        let line = line.map_err(io_error(path))?;

        if line.trim().is_empty() {
            continue;
        }

        let Some((key, value)) = parse_line(&line) else {
            summary.skipped += 1;
            continue;
        };

        tx.put(
            Column::Records,
            key.as_bytes().to_vec().into(),
            value.into_bytes().into(),
        );
        summary.records += 1;

        if tx.len() >= INGEST_BATCH_SIZE {
            flush(store, &mut tx)?;
        }
    }

    flush(store, &mut tx)?;

    debug!(%path, records = summary.records, "ingested file");

    Ok(summary)
}

fn flush(store: &Store, tx: &mut Transaction<'_>) -> Result<(), PipelineError> {
    if tx.is_empty() {
        return Ok(());
    }

    store
        .apply(tx)
        .map_err(|err| PipelineError::source_store("batch-write", err))?;

    *tx = Transaction::default();

    Ok(())
}

/// Ingests every record file under `dir`.
pub async fn ingest_dir(store: Store, dir: Utf8PathBuf) -> Result<IngestSummary, PipelineError> {
    spawn_blocking(move || -> Result<IngestSummary, PipelineError> {
        let files = list_record_files(&dir)?;
        let mut total = IngestSummary::default();

        for path in &files {
            let summary = ingest_file(&store, path)?;

            total.files += summary.files;
            total.records += summary.records;
            total.skipped += summary.skipped;
        }

        info!(%dir, files = total.files, records = total.records, "ingest finished");

        Ok(total)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use std::fs;

    use flowkv_store::db::InMemoryDB;
    use tempdir::TempDir;

    use super::*;

    fn root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn parses_key_and_normalized_value() {
        assert_eq!(
            parse_line("  1000   a  b\tc "),
            Some(("1000", "a b c".to_owned()))
        );
        assert_eq!(parse_line("1000"), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn lists_txt_files_recursively_in_order() {
        let dir = TempDir::new("ingest").unwrap();
        let root = root(&dir);

        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::write(root.join("b/nested/2.txt"), "").unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::write(root.join("b/notes.md"), "").unwrap();

        let files = list_record_files(&root).unwrap();

        assert_eq!(files, vec![root.join("a.txt"), root.join("b/nested/2.txt")]);
    }

    #[tokio::test]
    async fn ingests_records_into_record_column() {
        let dir = TempDir::new("ingest").unwrap();
        let root = root(&dir);

        fs::write(root.join("day1.txt"), "1000 a b\n\n1001 c d\n1002\n").unwrap();
        fs::create_dir_all(root.join("more")).unwrap();
        fs::write(root.join("more/day2.txt"), "1003   e   f\n").unwrap();

        let store = Store::from_db(InMemoryDB::new());

        let summary = ingest_dir(store.clone(), root).await.unwrap();

        assert_eq!(
            summary,
            IngestSummary {
                files: 2,
                records: 3,
                skipped: 1,
            }
        );
        assert_eq!(
            store.get(Column::Records, b"1003").unwrap().as_deref(),
            Some(&b"e f"[..])
        );
        assert!(store.get(Column::Flows, b"1000").unwrap().is_none());
    }
}
