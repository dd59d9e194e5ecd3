use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::prelude::*;

const DEFAULT_ENABLED_VALUE: &str = "on";

/// The schedule definition: meters, appliance columns, display options.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScheduleConfig {
    pub name: Option<String>,

    /// Include slots that have already ended.
    #[serde(default)]
    pub show_past: bool,

    /// Include slots that have not started yet.
    #[serde(default = "default_show_future")]
    pub show_future: bool,

    pub import_meter: SupplyConfig,
    pub export_meter: Option<SupplyConfig>,

    #[serde(default)]
    pub columns: Vec<ColumnConfig>,

    /// Display hints keyed by a color name, passed through to the output untouched.
    #[serde(default)]
    pub color_config: HashMap<String, String>,

    #[serde(default = "default_price_decimals")]
    pub price_decimals: usize,

    #[serde(default = "default_power_decimals")]
    pub power_decimals: usize,

    #[serde(default = "default_price_unit")]
    pub price_unit: String,
}

impl ScheduleConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(text).context("failed to parse the schedule configuration")?;
        config.columns.iter_mut().for_each(ColumnConfig::normalize);
        Ok(config)
    }
}

/// Rate-stream entities and display thresholds for one meter direction.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SupplyConfig {
    pub past_rates_entity: Option<String>,
    pub current_rates_entity: Option<String>,
    pub future_rates_entity: Option<String>,

    /// Display threshold in pence: prices at or above this render as peak.
    pub high_cost: f64,

    /// Display threshold in pence: prices at or below this render as cheap.
    pub low_cost: f64,
}

/// A single appliance rule.
#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ColumnConfig {
    pub name: String,
    pub group: Option<String>,

    #[serde(default)]
    pub disabled: bool,

    /// Shorthand for a single entry in `enabled_entities`.
    pub enabled_entity: Option<EnabledEntity>,

    #[serde(default)]
    pub enabled_entities: Vec<EnabledEntity>,

    /// Shorthand for a single entry in `time_entities`.
    pub time_entity: Option<String>,

    #[serde(default)]
    pub time_entities: Vec<String>,

    pub min_price_entity: Option<String>,
    pub max_price_entity: Option<String>,
    pub min_export_price_entity: Option<String>,
    pub max_export_price_entity: Option<String>,

    /// Fixed draw in watts; negative for generation or discharge.
    pub power: Option<f64>,

    pub active_text: Option<String>,
    pub inactive_text: Option<String>,
    pub active_color: Option<String>,
    pub inactive_color: Option<String>,
}

impl ColumnConfig {
    /// Fold the singular shorthand fields into the plural lists.
    fn normalize(&mut self) {
        if let Some(entity) = self.enabled_entity.take() {
            self.enabled_entities.insert(0, entity);
        }
        if let Some(entity) = self.time_entity.take() {
            self.time_entities.insert(0, entity);
        }
    }
}

/// An enabling-entity reference: either just the entity id, or the id together
/// with the state value that counts as "enabled".
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EnabledEntity {
    Name(String),
    Config(EnabledEntityConfig),
}

impl EnabledEntity {
    pub fn entity_name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Config(config) => &config.entity_name,
        }
    }

    pub fn enabled_value(&self) -> &str {
        match self {
            Self::Name(_) => DEFAULT_ENABLED_VALUE,
            Self::Config(config) => &config.enabled_value,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EnabledEntityConfig {
    pub entity_name: String,

    #[serde(default = "default_enabled_value")]
    pub enabled_value: String,
}

const fn default_show_future() -> bool {
    true
}

const fn default_price_decimals() -> usize {
    1
}

const fn default_power_decimals() -> usize {
    1
}

fn default_price_unit() -> String {
    "p".to_owned()
}

fn default_enabled_value() -> String {
    DEFAULT_ENABLED_VALUE.to_owned()
}
