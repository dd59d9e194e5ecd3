use chrono::{DateTime, Local};
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    config::{ColumnConfig, EnabledEntity},
    engine::time_window::{self, TimeWindow},
    prelude::*,
    state::StateStore,
};

/// Resolution of an optional price bound.
///
/// `Unconfigured` and `Unparseable` behave identically downstream; they are kept
/// apart so that a bad sensor reading shows up in the logs instead of vanishing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Threshold {
    Unconfigured,
    Unparseable,
    Value(f64),
}

impl Threshold {
    fn resolve(store: &StateStore, entity_id: Option<&str>) -> Result<Self> {
        let Some(state) = store.read(entity_id)? else {
            return Ok(Self::Unconfigured);
        };
        match state.state.trim().parse() {
            Ok(value) => Ok(Self::Value(value)),
            Err(_) => {
                warn!(
                    entity_id = entity_id.unwrap_or_default(),
                    state = %state.state,
                    "price threshold is not numeric, ignoring"
                );
                Ok(Self::Unparseable)
            }
        }
    }

    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(value),
            Self::Unconfigured | Self::Unparseable => None,
        }
    }
}

/// A configured column plus everything resolved for the current pass.
#[skip_serializing_none]
#[derive(Serialize)]
pub struct ColumnData {
    #[serde(flatten)]
    pub config: ColumnConfig,

    pub enabled: bool,

    /// Resolved thresholds in pence; `None` when unconfigured or unreadable.
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_export_price: Option<f64>,
    pub max_export_price: Option<f64>,

    /// `None` when the column has no time entities configured at all.
    pub active_times: Option<Vec<TimeWindow>>,
}

/// Resolve a column's enablement and thresholds against the snapshot.
///
/// Every field is resolved even for a disabled column, so a caller inspecting
/// the result still sees the thresholds it would apply.
pub fn evaluate(
    store: &StateStore,
    config: &ColumnConfig,
    now: DateTime<Local>,
) -> Result<ColumnData> {
    let min_price = Threshold::resolve(store, config.min_price_entity.as_deref())?;
    let max_price = Threshold::resolve(store, config.max_price_entity.as_deref())?;
    let min_export_price = Threshold::resolve(store, config.min_export_price_entity.as_deref())?;
    let max_export_price = Threshold::resolve(store, config.max_export_price_entity.as_deref())?;

    let active_times = if config.time_entities.is_empty() {
        None
    } else {
        let windows = config
            .time_entities
            .iter()
            .map(|entity_id| time_window::resolve(store, entity_id, now))
            .collect::<Result<Vec<_>>>()?;
        Some(windows.into_iter().flatten().collect::<Vec<_>>())
    };

    let enabled = is_enabled(store, config, active_times.as_deref())?;

    Ok(ColumnData {
        config: config.clone(),
        enabled,
        min_price: min_price.value(),
        max_price: max_price.value(),
        min_export_price: min_export_price.value(),
        max_export_price: max_export_price.value(),
        active_times,
    })
}

fn is_enabled(
    store: &StateStore,
    config: &ColumnConfig,
    active_times: Option<&[TimeWindow]>,
) -> Result<bool> {
    if config.disabled {
        return Ok(false);
    }
    for entity in &config.enabled_entities {
        if !is_enabling_entity_active(store, entity)? {
            return Ok(false);
        }
    }
    if let Some(windows) = active_times {
        // At least one non-degenerate window is required.
        if windows.iter().all(|window| window.is_empty()) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_enabling_entity_active(store: &StateStore, entity: &EnabledEntity) -> Result<bool> {
    let Some(state) = store.read(Some(entity.entity_name()))? else {
        return Ok(false);
    };
    Ok(state.state == entity.enabled_value())
}
