#![allow(unused)]

use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod annotate;
mod error;
mod index;
mod lookup;
mod prelude;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Index attestation sections in certificate PDFs and underline them on demand"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Root directory of the source PDF tree (<root>/<group>/.../<file>.pdf)
    #[clap(
        long,
        env = "ATTESTMARK_SOURCE_ROOT",
        global = true,
        default_value = "ehcs/requests"
    )]
    source_root: PathBuf,
    /// Root directory of the index artifacts
    #[clap(
        long,
        env = "ATTESTMARK_INDEX_ROOT",
        global = true,
        default_value = "ehcs/data"
    )]
    index_root: PathBuf,
    /// Root directory for annotated request output
    #[clap(
        long,
        env = "ATTESTMARK_REQUEST_ROOT",
        global = true,
        default_value = "ehcs/output"
    )]
    request_root: PathBuf,

    /// Whether to display additional information.
    #[clap(long, env = "ATTESTMARK_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    fn config(&self) -> attest::Config {
        attest::Config {
            source_root: self.source_root.clone(),
            index_root: self.index_root.clone(),
            request_root: self.request_root.clone(),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Walk the source tree and (re)write every index artifact
    Index(crate::index::Options),

    /// Underline selected attestations onto copies of a group's PDFs
    Annotate(crate::annotate::Options),

    /// Show the indexed attestations of a group
    Lookup(crate::lookup::Options),
}

fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Index(options) => crate::index::run(options, app.global),
        SubCommands::Annotate(options) => crate::annotate::run(options, app.global),
        SubCommands::Lookup(options) => crate::lookup::run(options, app.global),
    }
}
