use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Deserialize;

use crate::{engine::parse_instant, prelude::*};

/// Attribute payload of an Octopus Energy rates sensor.
#[derive(Deserialize)]
pub struct RatesAttributes {
    pub rates: Vec<RawRate>,
}

/// One priced interval exactly as published in the sensor attributes.
#[derive(Clone, Deserialize)]
pub struct RawRate {
    pub start: String,
    pub end: String,
    pub value_inc_vat: f64,

    #[serde(default)]
    pub is_capped: bool,
}

/// A parsed tariff slot.
#[derive(Clone, Debug)]
pub struct RateSlot {
    /// Verbatim source timestamps. The instants below are derived from these and
    /// are never authoritative on their own.
    pub start_raw: String,
    pub end_raw: String,

    pub start: DateTime<Local>,
    pub end: DateTime<Local>,

    /// Currency major units per kilowatt-hour, VAT included.
    pub unit_price: f64,

    pub is_capped: bool,
}

impl RateSlot {
    fn try_from_raw(raw: RawRate) -> Result<Self> {
        let start = parse_instant(&raw.start)
            .with_context(|| format!("invalid rate slot start `{}`", raw.start))?;
        let end = parse_instant(&raw.end)
            .with_context(|| format!("invalid rate slot end `{}`", raw.end))?;
        if start >= end {
            warn!(start = %raw.start, end = %raw.end, "rate slot does not end after it starts");
        }
        Ok(Self {
            start_raw: raw.start,
            end_raw: raw.end,
            start,
            end,
            unit_price: raw.value_inc_vat,
            is_capped: raw.is_capped,
        })
    }

    /// The unit price in pence-equivalent minor units.
    #[must_use]
    pub fn pence(&self) -> f64 {
        self.unit_price * 100.0
    }
}

/// Merged, time-ordered tariff slots for one meter direction.
#[must_use]
#[derive(Default, derive_more::Index)]
pub struct RateSeries(Vec<RateSlot>);

impl RateSeries {
    /// Combine up to three partial streams into one sorted series.
    ///
    /// Slots sharing a start instant may arrive from several streams; the first
    /// one in past → current → future concatenation order wins.
    pub fn merge(
        streams: Vec<Option<RatesAttributes>>,
        include_past: bool,
        include_future: bool,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let slots: Vec<RateSlot> = streams
            .into_iter()
            .flatten()
            .flat_map(|attributes| attributes.rates)
            .map(RateSlot::try_from_raw)
            .collect::<Result<_>>()?;
        let slots = slots
            .into_iter()
            .filter(|slot| include_past || slot.end >= now)
            .filter(|slot| include_future || slot.start <= now)
            .unique_by(|slot| slot.start)
            .sorted_by_key(|slot| slot.start)
            .collect();
        Ok(Self(slots))
    }

    /// Look up the slot starting exactly at the given instant.
    pub fn find(&self, start: DateTime<Local>) -> Option<&RateSlot> {
        self.0
            .binary_search_by_key(&start, |slot| slot.start)
            .ok()
            .map(|index| &self.0[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateSlot> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
