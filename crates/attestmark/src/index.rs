use attest::DocumentOutcome;

use crate::prelude::*;
use crate::prelude::println;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Only list documents that failed to index
    #[clap(long)]
    failed_only: bool,
}

pub fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.config();
    let report = attest::index::index_corpus(&config);

    let mut table = new_table();
    table.add_row(prettytable::row!["DOCUMENT", "RESULT"]);
    for document in &report.documents {
        match &document.outcome {
            DocumentOutcome::Indexed { attestations } => {
                if !options.failed_only {
                    table.add_row(prettytable::row![
                        document.path.display(),
                        f!("{} attestations", attestations)
                    ]);
                }
            }
            DocumentOutcome::Failed { reason } => {
                table.add_row(prettytable::row![document.path.display(), f!("failed: {}", reason)]);
            }
        }
    }
    table.printstd();

    println!(
        "{} indexed, {} failed",
        report.indexed(),
        report.failed()
    );

    Ok(())
}
