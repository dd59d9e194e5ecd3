pub mod column;
pub mod rates;
pub mod row;
pub mod time_window;

use bon::Builder;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::{ScheduleConfig, SupplyConfig},
    engine::{
        column::ColumnData,
        rates::{RateSeries, RatesAttributes},
        row::RowResult,
    },
    prelude::*,
    state::StateStore,
};

/// Everything the rendering layer needs for one refresh.
#[derive(Serialize)]
pub struct DisplayData {
    /// Enabled columns only, in configuration order; row cells align with these.
    pub columns: Vec<ColumnData>,

    /// Ascending by slot start instant.
    pub rows: Vec<RowResult>,
}

/// One full schedule computation over a fixed state snapshot.
///
/// "Now" is captured once per pass, so that every time comparison inside the
/// pass agrees on what the current instant is.
#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct Pass<'a> {
    store: &'a StateStore,
    config: &'a ScheduleConfig,

    #[builder(default = Local::now())]
    now: DateTime<Local>,
}

impl<S: pass_builder::IsComplete> PassBuilder<'_, S> {
    pub fn compute(self) -> Result<DisplayData> {
        self.build().compute()
    }
}

impl Pass<'_> {
    fn compute(&self) -> Result<DisplayData> {
        let import = self.merged_rates(Some(&self.config.import_meter))?;
        let export = self.merged_rates(self.config.export_meter.as_ref())?;

        let columns: Vec<ColumnData> = self
            .config
            .columns
            .iter()
            .map(|config| column::evaluate(self.store, config, self.now))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|column| column.enabled)
            .collect();

        let rows = row::generate(&columns, &import, &export);
        Ok(DisplayData { columns, rows })
    }

    fn merged_rates(&self, meter: Option<&SupplyConfig>) -> Result<RateSeries> {
        let Some(meter) = meter else {
            return Ok(RateSeries::default());
        };
        let streams = [&meter.past_rates_entity, &meter.current_rates_entity, &meter.future_rates_entity]
            .into_iter()
            .map(|entity_id| self.rates_attributes(entity_id.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        RateSeries::merge(streams, self.config.show_past, self.config.show_future, self.now)
    }

    fn rates_attributes(&self, entity_id: Option<&str>) -> Result<Option<RatesAttributes>> {
        let Some(state) = self.store.read(entity_id)? else {
            return Ok(None);
        };
        let entity_id = entity_id.unwrap_or_default();
        ensure!(
            state.attributes.contains_key("rates"),
            "entity `{entity_id}` is not a valid rates entity (no `rates` attribute)",
        );
        let attributes = serde_json::from_value(Value::Object(state.attributes.clone()))
            .with_context(|| format!("malformed rates attributes on `{entity_id}`"))?;
        Ok(Some(attributes))
    }
}

/// Parse a sensor-supplied timestamp into a local instant.
///
/// The Octopus integration publishes RFC 3339 timestamps, occasionally without
/// the seconds component.
pub(crate) fn parse_instant(text: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%#z"))
        .map(|instant| instant.with_timezone(&Local))
        .with_context(|| format!("`{text}` is not a recognized timestamp"))
}
