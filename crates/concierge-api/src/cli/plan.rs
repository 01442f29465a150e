//! `concierge plan`: show the build order without building anything.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use concierge_core::provision::EdgeOrigin;
use concierge_core::topology::concierge_units;
use concierge_types::config::DeploymentConfig;

pub fn plan(config: &DeploymentConfig, json: bool) -> Result<()> {
    let graph = concierge_units(config)?;
    let plan = graph.plan()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!();
    println!("  {}", style("── Build order ──").dim());
    for (wave_idx, wave) in plan.waves.iter().enumerate() {
        let units: Vec<String> = wave.iter().map(|u| style(u).cyan().to_string()).collect();
        println!("  wave {wave_idx}: {}", units.join(", "));
    }
    println!();

    if !plan.edges.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Producer", "Consumer", "Declared"]);

        for edge in &plan.edges {
            let origin = match edge.origin {
                EdgeOrigin::Both => Cell::new("explicit + inferred").fg(Color::Green),
                EdgeOrigin::Explicit => Cell::new("explicit").fg(Color::Green),
                EdgeOrigin::Inferred => Cell::new("inferred only").fg(Color::Yellow),
            };
            table.add_row(vec![
                Cell::new(edge.from.as_str()),
                Cell::new(edge.to.as_str()),
                origin,
            ]);
        }
        println!("{table}");
        println!();
    }

    Ok(())
}
