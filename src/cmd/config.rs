//! Config command - print the effective report configuration

use super::load_config;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// JSON file overriding the default report configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        Ok(())
    }
}
