use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    config::{ScheduleConfig, SupplyConfig},
    engine::{DisplayData, column::ColumnData, row::CellResult},
};

/// Render the full schedule table: prices, per-column activation, totals.
#[must_use]
pub fn schedule_table(config: &ScheduleConfig, data: &DisplayData) -> Table {
    let mut table = new_table();
    let mut header = vec![Cell::new("Time"), Cell::new("Import"), Cell::new("Export")];
    header.extend(data.columns.iter().map(|column| column_header(column, &config.price_unit)));
    header.push(Cell::new("Power"));
    header.push(Cell::new("Cost"));
    table.set_header(header);

    for row in &data.rows {
        let mut cells = vec![
            Cell::new(row.time.format("%H:%M")),
            price_cell(config, &config.import_meter, row.import_price, false),
            export_price_cell(config, row.export_price),
        ];
        for (cell, column) in row.cells.iter().zip(&data.columns) {
            cells.push(activation_cell(column, cell, config.power_decimals));
        }
        cells.push(
            Cell::new(format!("{:.*} kW", config.power_decimals, row.total_power / 1000.0))
                .set_alignment(CellAlignment::Right),
        );
        cells.push(
            Cell::new(format!("{:.*}{}", config.price_decimals, row.cost, config.price_unit))
                .set_alignment(CellAlignment::Right)
                .fg(if row.cost > 0.0 { Color::Red } else { Color::Green }),
        );
        table.add_row(cells);
    }
    table
}

/// Render just the merged price streams, without any column evaluation.
#[must_use]
pub fn rates_table(config: &ScheduleConfig, data: &DisplayData) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Time", "Import", "Export"]);
    for row in &data.rows {
        table.add_row(vec![
            Cell::new(row.time.format("%H:%M")),
            price_cell(config, &config.import_meter, row.import_price, false),
            export_price_cell(config, row.export_price),
        ]);
    }
    table
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn column_header(column: &ColumnData, price_unit: &str) -> Cell {
    let mut text = column.config.name.clone();
    match (column.min_price, column.max_price) {
        (Some(min), Some(max)) => text.push_str(&format!("\n>{min}{price_unit}, <{max}{price_unit}")),
        (Some(min), None) => text.push_str(&format!("\n>{min}{price_unit}")),
        (None, Some(max)) => text.push_str(&format!("\n<{max}{price_unit}")),
        (None, None) => {}
    }
    Cell::new(text)
}

fn price_cell(
    config: &ScheduleConfig,
    meter: &SupplyConfig,
    unit_price: Option<f64>,
    invert: bool,
) -> Cell {
    let Some(unit_price) = unit_price else {
        return Cell::new("--").set_alignment(CellAlignment::Right);
    };
    let pence = unit_price * 100.0;
    let color = match (pence <= meter.low_cost, pence < meter.high_cost, invert) {
        // For the export direction a high price is the good case.
        (true, _, true) => Color::Red,
        (false, true, true) => Color::DarkYellow,
        (false, false, true) => Color::Green,
        (true, _, false) => Color::Green,
        (false, true, false) => Color::DarkYellow,
        (false, false, false) => Color::Red,
    };
    Cell::new(format!("{:.*}{}", config.price_decimals, pence, config.price_unit))
        .set_alignment(CellAlignment::Right)
        .fg(color)
}

fn export_price_cell(config: &ScheduleConfig, unit_price: Option<f64>) -> Cell {
    match &config.export_meter {
        Some(meter) => price_cell(config, meter, unit_price, true),
        None => Cell::new("--").set_alignment(CellAlignment::Right),
    }
}

fn activation_cell(column: &ColumnData, cell: &CellResult, power_decimals: usize) -> Cell {
    if cell.cell_active {
        let text = match (&column.config.active_text, column.config.power) {
            (Some(text), Some(power)) => format!("{text} {:.*} kW", power_decimals, power / 1000.0),
            (Some(text), None) => text.clone(),
            (None, Some(power)) => format!("{:.*} kW", power_decimals, power / 1000.0),
            (None, None) => "on".to_owned(),
        };
        Cell::new(text).fg(Color::Green)
    } else {
        Cell::new(column.config.inactive_text.as_deref().unwrap_or("–"))
            .add_attribute(Attribute::Dim)
    }
}
