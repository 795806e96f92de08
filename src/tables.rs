use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::estimator::{Estimate, InterventionPolicy},
    locations::Locations,
    quantity::cost::Cost,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn format_cost(currency: &str, cost: Cost) -> String {
    format!("{currency}{cost}")
}

/// Largest assets first, at most `top` of them.
#[must_use]
pub fn build_assets_table(
    estimate: &Estimate,
    locations: &Locations,
    top: usize,
    currency: &str,
) -> Table {
    let mut table = new_table();
    table.set_header(vec!["#", "Asset", "Location", "Volume", "Cost"]);
    for (rank, asset) in estimate.assets.iter().take(top).enumerate() {
        let location = locations.get(&asset.bm_unit_id);
        table.add_row(vec![
            Cell::new(rank + 1).add_attribute(Attribute::Dim),
            Cell::new(&asset.bm_unit_id).add_attribute(Attribute::Bold),
            location.map_or_else(
                || Cell::new("unknown").add_attribute(Attribute::Dim),
                |location| Cell::new(&location.name),
            ),
            Cell::new(asset.volume).set_alignment(CellAlignment::Right),
            Cell::new(format_cost(currency, asset.cost))
                .set_alignment(CellAlignment::Right)
                .fg(Color::Red),
        ]);
    }
    table
}

#[must_use]
pub fn build_summary_table(estimate: &Estimate, currency: &str) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        Cell::new("Curtailed volume"),
        Cell::new(estimate.total_volume).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Estimated cost"),
        Cell::new(format_cost(currency, estimate.total_cost))
            .set_alignment(CellAlignment::Right)
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Price"),
        Cell::new(format!("{currency}{}", estimate.price)).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Assets"),
        Cell::new(estimate.n_assets()).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Interventions"),
        Cell::new(format!("{} of {}", estimate.n_interventions, estimate.n_records))
            .set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Policy"),
        Cell::new(match (estimate.policy, estimate.fallback_applied) {
            (InterventionPolicy::AllWind, _) => "all classified",
            (InterventionPolicy::TurnDown, false) => "turn-down only",
            (InterventionPolicy::TurnDown, true) => "turn-down, fell back to all classified",
        })
        .fg(if estimate.fallback_applied { Color::DarkYellow } else { Color::Reset }),
    ]);
    if !estimate.rejected.is_empty() {
        table.add_row(vec![
            Cell::new("Rejected rows"),
            Cell::new(estimate.rejected.len())
                .set_alignment(CellAlignment::Right)
                .fg(Color::DarkYellow),
        ]);
    }
    table
}
