use std::sync::Arc;

use clap::{Parser, ValueEnum};
use eyre::Result as EyreResult;
use flowkv_pipeline::{Dispatch, FlowStore, Pipeline, StoreSource};

use crate::cli::RootArgs;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DispatchArg {
    Shared,
    Keyed,
}

impl From<DispatchArg> for Dispatch {
    fn from(value: DispatchArg) -> Self {
        match value {
            DispatchArg::Shared => Dispatch::Shared,
            DispatchArg::Keyed => Dispatch::Keyed,
        }
    }
}

/// Re-key an interval of raw records into the flow store
#[derive(Debug, Parser)]
pub struct LoadCommand {
    /// First record key of the interval
    #[arg(long, value_name = "KEY")]
    pub start: String,

    /// Last record key of the interval, inclusive
    #[arg(long, value_name = "KEY")]
    pub end: String,

    /// Override the number of scan partitions
    #[arg(long, value_name = "N")]
    pub partitions: Option<usize>,

    /// Override the number of merge writers
    #[arg(long, value_name = "N")]
    pub writers: Option<usize>,

    /// Override the page size of a single scan
    #[arg(long, value_name = "N")]
    pub scan_limit: Option<usize>,

    /// Override how accumulations are routed to writers
    #[arg(long, value_enum)]
    pub dispatch: Option<DispatchArg>,
}

impl LoadCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let mut config = root_args.load_config()?;

        if let Some(partitions) = self.partitions {
            config.pipeline.partitions = partitions;
        }
        if let Some(writers) = self.writers {
            config.pipeline.writers = writers;
        }
        if let Some(scan_limit) = self.scan_limit {
            config.pipeline.scan_limit = scan_limit;
        }
        if let Some(dispatch) = self.dispatch {
            config.pipeline.dispatch = dispatch.into();
        }

        let registry = config.validate()?;

        let source = StoreSource::new(root_args.open_store(&config.source.path, true)?)
            .with_max_scan_limit(config.source.max_scan_limit);
        let destination = FlowStore::new(root_args.open_store(&config.destination.path, false)?);

        let pipeline = Pipeline::new(
            Arc::new(source),
            destination,
            Arc::new(registry),
            config.pipeline,
        )?;

        let report = pipeline.run(&self.start, &self.end).await?;

        println!("{report}");

        Ok(())
    }
}
