//! Settings for `hypervisor-facts`
//!
//! Resolved once, in order: defaults, config file, CLI flags.

use clap::Parser;
use serde::Deserialize;
use stackledger_core::config::{default_config_path, load_overrides};
use stackledger_core::Result;
use std::path::PathBuf;

pub const TOOL_NAME: &str = "hypervisor_facts";

#[derive(Debug, Clone, Parser)]
#[command(name = "hypervisor-facts")]
#[command(about = "Record OpenStack hypervisor facts when they change")]
#[command(version)]
pub struct Cli {
    /// Output debugging information
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (JSON)
    #[arg(short = 'C', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
}

/// Config-file keys; every field is optional and unknown keys are ignored
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FactsOverrides {
    pub outdir: Option<PathBuf>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactsConfig {
    pub config_file: PathBuf,
    pub outdir: PathBuf,
    pub verbose: bool,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            config_file: default_config_path(TOOL_NAME),
            outdir: PathBuf::from("."),
            verbose: false,
        }
    }
}

impl FactsConfig {
    /// Layer config-file overrides, then CLI flags, over the defaults
    pub fn resolve(cli: &Cli, file: FactsOverrides) -> Self {
        let mut config = FactsConfig::default();
        if let Some(path) = &cli.config_file {
            config.config_file = path.clone();
        }

        if let Some(outdir) = file.outdir {
            config.outdir = outdir;
        }
        if let Some(verbose) = file.verbose {
            config.verbose = verbose;
        }

        if let Some(outdir) = &cli.outdir {
            config.outdir = outdir.clone();
        }
        if cli.verbose {
            config.verbose = true;
        }

        config
    }

    pub async fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config_file
            .clone()
            .unwrap_or_else(|| default_config_path(TOOL_NAME));
        let file = load_overrides::<FactsOverrides>(&path).await?;
        Ok(Self::resolve(cli, file))
    }
}
