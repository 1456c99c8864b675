use std::fs::create_dir_all;

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use flowkv_config::ConfigFile;
use tracing::info;

use crate::cli::RootArgs;

/// Write a default configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let home = &root_args.home;

        if ConfigFile::exists(home) && !self.force {
            bail!("flowkv is already initialized in {home:?}, pass --force to overwrite");
        }

        create_dir_all(home).wrap_err_with(|| format!("failed to create {home:?}"))?;

        let config = ConfigFile::default();
        let _registry = config.validate()?;

        config.save(home)?;

        info!(%home, "initialized flowkv configuration");

        Ok(())
    }
}
