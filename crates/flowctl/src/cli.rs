use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use const_format::concatcp;
use eyre::{bail, Result as EyreResult};
use flowkv_config::{dirs, ConfigFile};
use flowkv_store::config::StoreConfig;
use flowkv_store::Store;
use flowkv_store_rocksdb::RocksDB;

use crate::defaults;

mod graph;
mod ingest;
mod init;
mod load;
mod query;

use graph::GraphCommand;
use ingest::IngestCommand;
use init::InitCommand;
use load::LoadCommand;
use query::{GetCommand, ScanCommand};

pub const EXAMPLES: &str = r"
  # Create a default configuration
  $ flowctl --home data/ init

  # Load raw record files into the record store
  $ flowctl --home data/ ingest ./records

  # Re-key an interval into the flow store
  $ flowctl --home data/ load --start 1580274000 --end 1580277600 --partitions 8

  # Look up one flow
  $ flowctl --home data/ get '6 10.0.0.1 10.0.0.2'

  # Export the address graph of an interval
  $ flowctl --home data/ graph --start 1580274000 --end 1580277600
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  FLOWKV_HOME    Directory for config and data\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    Ingest(IngestCommand),
    #[command(alias = "run")]
    Load(LoadCommand),
    Get(GetCommand),
    Scan(ScanCommand),
    Graph(GraphCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config and data
    #[arg(long, value_name = "PATH", default_value_t = defaults::default_home())]
    #[arg(env = "FLOWKV_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,
}

impl RootArgs {
    pub fn load_config(&self) -> EyreResult<ConfigFile> {
        if !ConfigFile::exists(&self.home) {
            bail!(
                "flowkv is not initialized in {:?}, run `flowctl init` first",
                self.home
            );
        }

        ConfigFile::load(&self.home)
    }

    /// Opens the RocksDB store at `path`, relative to the home directory.
    pub fn open_store(&self, path: &Utf8Path, must_exist: bool) -> EyreResult<Store> {
        let path = dirs::resolve(&self.home, path);

        let config = if must_exist {
            StoreConfig::existing(path)
        } else {
            StoreConfig::new(path)
        };

        Store::open::<RocksDB>(&config)
    }
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Ingest(ingest) => ingest.run(&self.args).await,
            SubCommands::Load(load) => load.run(&self.args).await,
            SubCommands::Get(get) => get.run(&self.args),
            SubCommands::Scan(scan) => scan.run(&self.args),
            SubCommands::Graph(graph) => graph.run(&self.args).await,
        }
    }
}
