use std::sync::LazyLock;

use chrono::{DateTime, Days, Local, NaiveTime, TimeDelta};
use regex::Regex;
use serde_json::{Map, Value};

use crate::{engine::parse_instant, prelude::*, state::StateStore};

/// `H[:mm]` with an optional trailing `p` for PM; anything else means midnight.
static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?::(\d\d))?\s*(p?)").expect("the pattern must compile"));

/// Half-open `[start, end)` activity window.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl TimeWindow {
    pub const fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self { start, end }
    }

    pub fn contains(self, time: DateTime<Local>) -> bool {
        (self.start <= time) && (time < self.end)
    }

    /// Start and end coincide, so the window can never contain anything.
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// The two recognized time-entity attribute shapes.
#[derive(Debug)]
enum TimeSource<'a> {
    /// `after`/`before` ISO-8601 instants, as published by calendar-style sensors.
    Absolute { after: &'a str, before: &'a str },

    /// `start`/`end` daily wall-clock times, as published by schedule helpers.
    WallClock { start: &'a str, end: &'a str },
}

impl<'a> TimeSource<'a> {
    fn from_attributes(entity_id: &str, attributes: &'a Map<String, Value>) -> Result<Self> {
        let text = |key: &str| attributes.get(key).and_then(Value::as_str);
        if let (Some(after), Some(before)) = (text("after"), text("before")) {
            return Ok(Self::Absolute { after, before });
        }
        if let (Some(start), Some(end)) = (text("start"), text("end")) {
            return Ok(Self::WallClock { start, end });
        }
        bail!(
            "cannot determine the shape of time entity `{entity_id}`: \
             expected `after`/`before` or `start`/`end` attributes"
        )
    }
}

/// Resolve a time entity into a concrete window.
///
/// An absent sensor yields `Ok(None)`: optional time entities silently disable
/// their column instead of failing the pass.
pub fn resolve(
    store: &StateStore,
    entity_id: &str,
    now: DateTime<Local>,
) -> Result<Option<TimeWindow>> {
    let Some(state) = store.find(entity_id) else {
        return Ok(None);
    };
    let window = match TimeSource::from_attributes(entity_id, &state.attributes)? {
        TimeSource::Absolute { after, before } => TimeWindow::new(
            parse_instant(after)
                .with_context(|| format!("invalid `after` timestamp of `{entity_id}`"))?,
            parse_instant(before)
                .with_context(|| format!("invalid `before` timestamp of `{entity_id}`"))?,
        ),
        TimeSource::WallClock { start, end } => {
            let start = wall_clock_today(start, now)?;
            let end = wall_clock_today(end, now)?;
            if end < start {
                // The window crosses midnight.
                TimeWindow::new(start, advance_one_day(end)?)
            } else if end < now {
                // Today's occurrence has already elapsed, take tomorrow's.
                TimeWindow::new(advance_one_day(start)?, advance_one_day(end)?)
            } else {
                TimeWindow::new(start, end)
            }
        }
    };
    Ok(Some(window))
}

/// Place a wall-clock time onto today's date.
///
/// The PM flag blindly adds 12 hours, so hours past 23 spill over into the
/// next day.
fn wall_clock_today(text: &str, now: DateTime<Local>) -> Result<DateTime<Local>> {
    let midnight =
        now.with_time(NaiveTime::MIN).single().context("local midnight is ambiguous")?;
    let Some(captures) = TIME_OF_DAY.captures(text) else {
        return Ok(midnight);
    };
    let hour: i64 = captures[1].parse().with_context(|| format!("invalid hour in `{text}`"))?;
    let minute: i64 = captures.get(2).map_or(Ok(0), |minutes| minutes.as_str().parse())?;
    let hour = if captures[3].is_empty() { hour } else { hour + 12 };
    let offset = TimeDelta::try_hours(hour)
        .zip(TimeDelta::try_minutes(minute))
        .map(|(hours, minutes)| hours + minutes)
        .with_context(|| format!("time of day `{text}` is out of range"))?;
    midnight.checked_add_signed(offset).context("time out of range")
}

fn advance_one_day(instant: DateTime<Local>) -> Result<DateTime<Local>> {
    instant.checked_add_days(Days::new(1)).context("time out of range")
}
