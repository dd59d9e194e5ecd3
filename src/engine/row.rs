use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::engine::{
    column::ColumnData,
    rates::{RateSeries, RateSlot},
};

/// Activation verdict for one column in one time slot.
///
/// `None` means "no such constraint configured", which is different from the
/// constraint being evaluated and failing.
#[skip_serializing_none]
#[derive(Copy, Clone, Debug, Serialize)]
pub struct CellResult {
    pub is_active_time: Option<bool>,
    pub is_active_cost: Option<bool>,
    pub cell_active: bool,
}

/// One schedule table row, keyed by the slot start instant.
#[skip_serializing_none]
#[derive(Serialize)]
pub struct RowResult {
    pub time: DateTime<Local>,

    /// Raw unit prices in currency major units, straight from the rate slots.
    pub import_price: Option<f64>,
    pub export_price: Option<f64>,

    pub cells: Vec<CellResult>,

    /// Total draw of the active columns in watts.
    pub total_power: f64,

    /// Slot cost in pence-equivalent units; negative when exporting.
    pub cost: f64,
}

/// Generate one row per distinct slot start across both meter directions.
pub fn generate(
    columns: &[ColumnData],
    import: &RateSeries,
    export: &RateSeries,
) -> Vec<RowResult> {
    let starts: BTreeSet<DateTime<Local>> =
        import.iter().chain(export.iter()).map(|slot| slot.start).collect();
    starts
        .into_iter()
        .map(|time| generate_row(time, columns, import.find(time), export.find(time)))
        .collect()
}

fn generate_row(
    time: DateTime<Local>,
    columns: &[ColumnData],
    import: Option<&RateSlot>,
    export: Option<&RateSlot>,
) -> RowResult {
    let cells: Vec<CellResult> =
        columns.iter().map(|column| evaluate_cell(time, column, import)).collect();
    let total_power: f64 = cells
        .iter()
        .zip(columns)
        .filter(|(cell, _)| cell.cell_active)
        .map(|(_, column)| column.config.power.unwrap_or(0.0))
        .sum();
    RowResult {
        time,
        import_price: import.map(|slot| slot.unit_price),
        export_price: export.map(|slot| slot.unit_price),
        cells,
        total_power,
        cost: slot_cost(total_power, import, export),
    }
}

fn evaluate_cell(
    time: DateTime<Local>,
    column: &ColumnData,
    import: Option<&RateSlot>,
) -> CellResult {
    let is_active_time = column
        .active_times
        .as_ref()
        .map(|windows| windows.iter().any(|window| window.contains(time)));

    // NB: only the import price drives cost activation, even for exporting
    // columns. TODO: decide how the export price should feed in here.
    let is_active_cost = import.map(RateSlot::pence).and_then(|pence| {
        match (column.min_price, column.max_price) {
            (None, None) => None,
            (Some(min), Some(max)) => Some(min <= pence && pence <= max),
            (Some(min), None) => Some(pence >= min),
            (None, Some(max)) => Some(pence <= max),
        }
    });

    let cell_active = match (is_active_time, is_active_cost) {
        (None, None) => false,
        (Some(active), None) | (None, Some(active)) => active,
        (Some(time_ok), Some(cost_ok)) => time_ok && cost_ok,
    };

    CellResult { is_active_time, is_active_cost, cell_active }
}

/// Slot cost in pence-equivalent units.
///
/// NB: price is pence per kilowatt-hour, power is watts, and the slot is
/// 30 minutes, hence the fixed divisor.
fn slot_cost(total_power: f64, import: Option<&RateSlot>, export: Option<&RateSlot>) -> f64 {
    if total_power > 0.0 {
        import.map_or(0.0, |slot| total_power * slot.pence() / 20.0)
    } else if total_power < 0.0 {
        export.map_or(0.0, |slot| total_power * slot.pence() / 20.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;
    use crate::{config::ColumnConfig, engine::time_window::TimeWindow};

    fn instant(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).unwrap()
    }

    fn slot(start: DateTime<Local>, unit_price: f64) -> RateSlot {
        RateSlot {
            start_raw: start.to_rfc3339(),
            end_raw: (start + chrono::TimeDelta::minutes(30)).to_rfc3339(),
            start,
            end: start + chrono::TimeDelta::minutes(30),
            unit_price,
            is_capped: false,
        }
    }

    fn column(
        power: Option<f64>,
        min_price: Option<f64>,
        max_price: Option<f64>,
        active_times: Option<Vec<TimeWindow>>,
    ) -> ColumnData {
        let config = crate::config::ScheduleConfig::from_toml_str(
            r#"
            [import_meter]
            low_cost = 15.0
            high_cost = 28.0

            [[columns]]
            name = "Test"
            "#,
        )
        .unwrap();
        let config: ColumnConfig =
            ColumnConfig { power, ..config.columns.into_iter().next().unwrap() };
        ColumnData {
            config,
            enabled: true,
            min_price,
            max_price,
            min_export_price: None,
            max_export_price: None,
            active_times,
        }
    }

    #[test]
    fn test_cell_inactive_without_constraints() {
        let cell = evaluate_cell(instant(0, 0), &column(None, None, None, None), None);
        assert_eq!(cell.is_active_time, None);
        assert_eq!(cell.is_active_cost, None);
        assert!(!cell.cell_active);
    }

    #[test]
    fn test_cell_time_only() {
        let windows = vec![TimeWindow::new(instant(9, 0), instant(10, 0))];
        let column = column(None, None, None, Some(windows));
        assert!(evaluate_cell(instant(9, 30), &column, None).cell_active);
        assert!(!evaluate_cell(instant(10, 30), &column, None).cell_active);
    }

    #[test]
    fn test_cell_cost_only() {
        let cheap = slot(instant(0, 0), 0.10);
        let pricey = slot(instant(0, 30), 0.30);

        let max_only = column(None, None, Some(15.0), None);
        assert!(evaluate_cell(cheap.start, &max_only, Some(&cheap)).cell_active);
        assert!(!evaluate_cell(pricey.start, &max_only, Some(&pricey)).cell_active);

        let min_only = column(None, Some(25.0), None, None);
        assert!(!evaluate_cell(cheap.start, &min_only, Some(&cheap)).cell_active);
        assert!(evaluate_cell(pricey.start, &min_only, Some(&pricey)).cell_active);

        let band = column(None, Some(5.0), Some(15.0), None);
        assert!(evaluate_cell(cheap.start, &band, Some(&cheap)).cell_active);
        assert!(!evaluate_cell(pricey.start, &band, Some(&pricey)).cell_active);
    }

    #[test]
    fn test_cell_without_import_price_has_no_cost_verdict() {
        let column = column(None, Some(5.0), Some(15.0), None);
        let cell = evaluate_cell(instant(0, 0), &column, None);
        assert_eq!(cell.is_active_cost, None);
        assert!(!cell.cell_active);
    }

    #[test]
    fn test_cell_combines_time_and_cost() {
        let windows = vec![TimeWindow::new(instant(0, 0), instant(1, 0))];
        let column = column(None, None, Some(15.0), Some(windows));
        let cheap = slot(instant(0, 0), 0.10);
        let pricey = slot(instant(0, 30), 0.30);

        let cell = evaluate_cell(cheap.start, &column, Some(&cheap));
        assert_eq!((cell.is_active_time, cell.is_active_cost), (Some(true), Some(true)));
        assert!(cell.cell_active);

        let cell = evaluate_cell(pricey.start, &column, Some(&pricey));
        assert_eq!((cell.is_active_time, cell.is_active_cost), (Some(true), Some(false)));
        assert!(!cell.cell_active);
    }

    #[test]
    fn test_cost_formula_exact() {
        let import = slot(instant(0, 0), 0.10);
        assert_abs_diff_eq!(slot_cost(2000.0, Some(&import), None), 1000.0, epsilon = 1e-9);

        let import = slot(instant(0, 0), 0.20);
        assert_abs_diff_eq!(slot_cost(3000.0, Some(&import), None), 3000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cost_uses_export_price_for_negative_power() {
        let import = slot(instant(0, 0), 0.30);
        let export = slot(instant(0, 0), 0.10);
        assert_abs_diff_eq!(
            slot_cost(-2000.0, Some(&import), Some(&export)),
            -1000.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cost_zero_when_price_missing() {
        assert_abs_diff_eq!(slot_cost(2000.0, None, None), 0.0);
        assert_abs_diff_eq!(slot_cost(-2000.0, None, None), 0.0);
        assert_abs_diff_eq!(slot_cost(0.0, None, None), 0.0);
    }

    #[test]
    fn test_generate_collapses_duplicate_instants_across_directions() {
        let import = RateSeries::merge(
            vec![Some(serde_json::from_value(serde_json::json!({"rates": [
                {"start": "2024-01-15T00:00:00Z", "end": "2024-01-15T00:30:00Z", "value_inc_vat": 0.20},
            ]})).unwrap())],
            true,
            true,
            instant(0, 0),
        )
        .unwrap();
        let export = RateSeries::merge(
            vec![Some(serde_json::from_value(serde_json::json!({"rates": [
                {"start": "2024-01-15T00:00:00Z", "end": "2024-01-15T00:30:00Z", "value_inc_vat": 0.05},
                {"start": "2024-01-15T00:30:00Z", "end": "2024-01-15T01:00:00Z", "value_inc_vat": 0.06},
            ]})).unwrap())],
            true,
            true,
            instant(0, 0),
        )
        .unwrap();

        let rows = generate(&[], &import, &export);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().is_sorted_by_key(|row| row.time));
        assert_eq!(rows[0].import_price, Some(0.20));
        assert_eq!(rows[0].export_price, Some(0.05));
        assert_eq!(rows[1].import_price, None);
        assert_eq!(rows[1].export_price, Some(0.06));
    }
}
