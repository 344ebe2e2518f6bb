use crate::prelude::*;
use crate::prelude::{eprintln, println};

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Identifier for this annotation request; names the output directory
    #[clap(long)]
    request_id: String,

    /// Attestation group (numeric certificate id)
    #[clap(long = "group")]
    group_id: String,

    /// Attestation ids to underline, in draw order
    #[clap(required = true)]
    attestation_ids: Vec<String>,
}

pub fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.config();
    let outputs = attest::index::annotate_request(
        &config,
        &options.request_id,
        &options.group_id,
        &options.attestation_ids,
    )?;

    if outputs.is_empty() {
        eprintln!("no documents annotated for group {}", options.group_id);
        return Ok(());
    }

    for path in outputs {
        println!("{}", path.display());
    }

    Ok(())
}
