//! Providers command - list backend types and whether this build serves them.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color};
use oxdav_core::ProviderRegistry;
use oxdav_core::provider::ProviderInfo;

use crate::output::create_table;

#[derive(ClapArgs, Clone, Debug)]
pub struct Args {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &Args) -> Result<()> {
    let providers = ProviderRegistry::with_builtin().info();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        output_table(&providers);
    }

    Ok(())
}

fn output_table(providers: &[ProviderInfo]) {
    let mut table = create_table();
    table.set_header(vec!["Type", "Status", "Notes"]);

    for provider in providers {
        let status = if provider.available {
            Cell::new("Available").fg(Color::Green)
        } else {
            Cell::new("Unavailable").fg(Color::Red)
        };
        let notes = provider
            .unavailable_reason
            .as_deref()
            .unwrap_or(&provider.description);

        table.add_row(vec![Cell::new(&provider.id), status, Cell::new(notes)]);
    }

    println!("{table}");

    let available_count = providers.iter().filter(|p| p.available).count();
    eprintln!("\n{available_count} of {} backend type(s) available.", providers.len());
}
