use clap::Parser;
use eyre::Result as EyreResult;
use flowkv_pipeline::FlowStore;

use crate::cli::RootArgs;

/// Print the fragments of one flow, one per line
#[derive(Debug, Parser)]
pub struct GetCommand {
    #[arg(value_name = "FLOW_ID")]
    pub flow_id: String,
}

impl GetCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let flows = open_flows(root_args)?;

        let fragments = flows.fragments(&self.flow_id)?;

        if fragments.is_empty() {
            eprintln!("no flow {:?}", self.flow_id);
        }

        for fragment in fragments {
            println!("{fragment}");
        }

        Ok(())
    }
}

/// Print every fragment of the flows in `[START_ID, END_ID]`
#[derive(Debug, Parser)]
pub struct ScanCommand {
    #[arg(value_name = "START_ID")]
    pub start: String,

    #[arg(value_name = "END_ID")]
    pub end: String,
}

impl ScanCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let flows = open_flows(root_args)?;

        let rows = flows.scan_fragments(&self.start, &self.end)?;

        for (flow_id, fragment) in &rows {
            println!("{flow_id}\t{fragment}");
        }

        println!("{} fragments", rows.len());

        Ok(())
    }
}

fn open_flows(root_args: &RootArgs) -> EyreResult<FlowStore> {
    let config = root_args.load_config()?;

    Ok(FlowStore::new(
        root_args.open_store(&config.destination.path, true)?,
    ))
}
