use attest::Attestation;

use crate::prelude::*;

#[derive(Debug, clap::Args)]
pub struct Options {
    /// Attestation group (numeric certificate id)
    group: String,
}

pub fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.config();
    let Some(attestations) = attest::index::lookup_group(&config, &options.group)? else {
        return Err(Error::GroupNotFound(options.group).into());
    };

    let mut table = new_table();
    table.add_row(prettytable::row!["ID", "NAME", "PAGES", "LINES"]);
    for attestation in &attestations {
        add_rows(&mut table, attestation, 0);
    }
    table.printstd();

    Ok(())
}

fn add_rows(table: &mut prettytable::Table, attestation: &Attestation, depth: usize) {
    let indent = "  ".repeat(depth);
    table.add_row(prettytable::row![
        f!("{}{}", indent, attestation.id),
        attestation.name,
        f!("{}-{}", attestation.start_page, attestation.end_page),
        attestation.lines.len()
    ]);
    for child in &attestation.children {
        add_rows(table, child, depth + 1);
    }
}
