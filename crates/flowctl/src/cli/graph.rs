use std::sync::Arc;

use clap::Parser;
use eyre::Result as EyreResult;
use flowkv_config::dirs;
use flowkv_pipeline::graph::{GraphConfig, GraphConverter};
use flowkv_pipeline::StoreSource;

use crate::cli::RootArgs;

/// Export the address graph of an interval and run the converter on it
#[derive(Debug, Parser)]
pub struct GraphCommand {
    /// First record key of the interval
    #[arg(long, value_name = "KEY")]
    pub start: String,

    /// Last record key of the interval, inclusive
    #[arg(long, value_name = "KEY")]
    pub end: String,

    /// Keep the intermediate edge list
    #[arg(long)]
    pub keep: bool,
}

impl GraphCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let config = root_args.load_config()?;
        let registry = config.validate()?;

        let source = StoreSource::new(root_args.open_store(&config.source.path, true)?)
            .with_max_scan_limit(config.source.max_scan_limit);

        let converter = GraphConverter::new(GraphConfig {
            workdir: dirs::resolve(&root_args.home, &config.graph.workdir),
            keep_intermediate: config.graph.keep_intermediate || self.keep,
            ..config.graph
        });

        let build = converter
            .build(
                &Arc::new(source),
                &Arc::new(registry),
                &config.pipeline,
                &self.start,
                &self.end,
            )
            .await?;

        println!(
            "{} distinct address pairs from {} records",
            build.edges.distinct_pairs, build.edges.records
        );
        println!("stdout:\n{}\nstderr:\n{}", build.outcome.stdout, build.outcome.stderr);

        if let Err(err) = &build.outcome.result {
            eprintln!("graph conversion failed: {err}");
        }

        Ok(())
    }
}
