//! Address graph export and conversion.
//!
//! Records in an interval are reduced to their distinct `src dst` address pairs,
//! written one per line to an intermediate edge list, and handed to an external
//! converter. The converter runs outside the pipeline's failure domain: its
//! outcome is reported, never raised, and never touches the flow store.

use std::collections::BTreeSet;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, SubprocessError};
use crate::partition::RangePartitioner;
use crate::pipeline::PipelineConfig;
use crate::scanner::RangeScanner;
use crate::schema::SchemaRegistry;
use crate::source::SourceStore;

/// Name of the intermediate edge list inside [`GraphConfig::workdir`].
pub const EDGE_LIST_FILE: &str = "edges.txt";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Utf8PathBuf,
    pub keep_intermediate: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            program: "ToCSR".to_owned(),
            args: vec!["-g".to_owned()],
            workdir: "CSR".into(),
            keep_intermediate: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeListSummary {
    pub path: Utf8PathBuf,
    pub distinct_pairs: usize,
    /// Records that contributed a pair, duplicates included.
    pub records: u64,
}

/// Writes the distinct address pairs of `[start, end]` to `path`, sorted.
///
/// Scanning is partitioned the same way as a pipeline run.
pub async fn export_edges<S: SourceStore>(
    source: &Arc<S>,
    registry: &Arc<SchemaRegistry>,
    config: &PipelineConfig,
    start: &str,
    end: &str,
    path: &Utf8Path,
) -> Result<EdgeListSummary, PipelineError> {
    config.validate()?;

    let partitions = RangePartitioner::new(config.partitions)?.split(start, end)?;
    let mut tasks = JoinSet::new();

    for partition in partitions {
        let scanner = RangeScanner::new(Arc::clone(source), partition, config.scan_limit);
        let _handle = tasks.spawn(collect_edges(scanner, Arc::clone(registry)));
    }

    let mut edges = BTreeSet::new();
    let mut records = 0;

    while let Some(joined) = tasks.join_next().await {
        let (partial, count) = joined??;

        edges.extend(partial);
        records += count;
    }

    let mut contents = String::new();
    for edge in &edges {
        contents.push_str(edge);
        contents.push('\n');
    }

    tokio::fs::write(path, contents)
        .await
        .map_err(|source| PipelineError::Io {
            path: path.to_owned(),
            source,
        })?;

    info!(%path, pairs = edges.len(), records, "exported edge list");

    Ok(EdgeListSummary {
        path: path.to_owned(),
        distinct_pairs: edges.len(),
        records,
    })
}

async fn collect_edges<S: SourceStore>(
    mut scanner: RangeScanner<S>,
    registry: Arc<SchemaRegistry>,
) -> Result<(BTreeSet<String>, u64), PipelineError> {
    let mut edges = BTreeSet::new();
    let mut records = 0;

    while let Some(page) = scanner.next_page().await? {
        for record in &page.records {
            let Ok(value) = core::str::from_utf8(&record.value) else {
                continue;
            };

            let tokens: Vec<&str> = value.split_whitespace().collect();

            let Ok(schema) = registry.select(tokens.len()) else {
                continue;
            };

            let _ignored = edges.insert(schema.edge(&tokens));
            records += 1;
        }
    }

    Ok((edges, records))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    pub program: String,
    pub args: Vec<String>,
    pub input: Utf8PathBuf,
}

#[derive(Debug)]
pub struct ConversionOutcome {
    /// `None` if the program never ran.
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub result: Result<(), SubprocessError>,
}

impl ConversionOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct GraphBuild {
    pub edges: EdgeListSummary,
    pub outcome: ConversionOutcome,
}

#[derive(Clone, Debug)]
pub struct GraphConverter {
    config: GraphConfig,
}

impl GraphConverter {
    #[must_use]
    pub const fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn intermediate_path(&self) -> Utf8PathBuf {
        self.config.workdir.join(EDGE_LIST_FILE)
    }

    #[must_use]
    pub fn request(&self, input: Utf8PathBuf) -> ConversionRequest {
        ConversionRequest {
            program: self.config.program.clone(),
            args: self.config.args.clone(),
            input,
        }
    }

    /// Runs the converter once with `input` appended to its arguments.
    pub async fn convert(request: &ConversionRequest) -> ConversionOutcome {
        debug!(program = %request.program, args = ?request.args, input = %request.input, "running converter");

        let output = Command::new(&request.program)
            .args(&request.args)
            .arg(&request.input)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(source) => {
                error!(program = %request.program, %source, "failed to spawn converter");

                return ConversionOutcome {
                    status: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    result: Err(SubprocessError::Spawn {
                        program: request.program.clone(),
                        source,
                    }),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        info!(program = %request.program, %stdout, %stderr, "converter output");

        let result = if output.status.success() {
            Ok(())
        } else {
            warn!(program = %request.program, status = %output.status, "converter failed");

            Err(SubprocessError::Exit {
                program: request.program.clone(),
                status: output.status,
            })
        };

        ConversionOutcome {
            status: Some(output.status),
            stdout,
            stderr,
            result,
        }
    }

    /// Exports the edge list for `[start, end]` and converts it.
    ///
    /// Only the export can fail; the conversion result is carried in the
    /// returned outcome.
    pub async fn build<S: SourceStore>(
        &self,
        source: &Arc<S>,
        registry: &Arc<SchemaRegistry>,
        config: &PipelineConfig,
        start: &str,
        end: &str,
    ) -> Result<GraphBuild, PipelineError> {
        tokio::fs::create_dir_all(&self.config.workdir)
            .await
            .map_err(|source| PipelineError::Io {
                path: self.config.workdir.clone(),
                source,
            })?;

        let path = self.intermediate_path();
        let edges = export_edges(source, registry, config, start, end, &path).await?;

        let outcome = Self::convert(&self.request(path.clone())).await;

        if !self.config.keep_intermediate {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(%path, %err, "failed to remove edge list"),
            }
        }

        Ok(GraphBuild { edges, outcome })
    }
}
