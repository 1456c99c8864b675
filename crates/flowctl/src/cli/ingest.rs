use camino::Utf8PathBuf;
use clap::Parser;
use eyre::Result as EyreResult;
use flowkv_pipeline::ingest::ingest_dir;

use crate::cli::RootArgs;

/// Load raw record files into the record store
#[derive(Debug, Parser)]
pub struct IngestCommand {
    /// Directory searched recursively for `*.txt` record files
    #[arg(value_name = "DIR")]
    pub dir: Utf8PathBuf,
}

impl IngestCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let config = root_args.load_config()?;
        let store = root_args.open_store(&config.source.path, false)?;

        let summary = ingest_dir(store, self.dir).await?;

        println!(
            "ingested {} records from {} files ({} skipped)",
            summary.records, summary.files, summary.skipped
        );

        Ok(())
    }
}
