use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::prelude::*;

/// Point-in-time reading of a single entity.
#[derive(Clone, Debug, Deserialize)]
pub struct EntityState {
    pub state: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Read-only snapshot of the Home Assistant state store.
///
/// Built once per invocation, never mutated afterwards: every computation pass
/// sees one consistent set of readings.
#[must_use]
#[derive(Default)]
pub struct StateStore(HashMap<String, EntityState>);

impl StateStore {
    /// Read the current state of an optionally configured entity.
    ///
    /// A `None` id means the feature referencing the entity is not configured and
    /// yields `Ok(None)`. A configured id that is missing from the snapshot is a
    /// configuration error and fails the whole pass.
    pub fn read(&self, entity_id: Option<&str>) -> Result<Option<&EntityState>> {
        let Some(entity_id) = entity_id else {
            return Ok(None);
        };
        let state = self
            .0
            .get(entity_id)
            .with_context(|| format!("entity `{entity_id}` not found in the state snapshot"))?;
        Ok(Some(state))
    }

    /// Plain lookup without the unknown-entity check, for callers that treat a
    /// missing sensor as "currently inactive" rather than as an error.
    pub fn find(&self, entity_id: &str) -> Option<&EntityState> {
        self.0.get(entity_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load a snapshot from a JSON dump of `GET /api/states`.
    pub fn from_snapshot_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let entries: Vec<StateEntry> =
            serde_json::from_str(&text).context("failed to deserialize the state snapshot")?;
        Ok(Self::from(entries))
    }
}

impl FromIterator<(String, EntityState)> for StateStore {
    fn from_iter<I: IntoIterator<Item = (String, EntityState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One element of the `/api/states` array.
#[derive(Deserialize)]
pub struct StateEntry {
    pub entity_id: String,

    #[serde(flatten)]
    pub state: EntityState,
}

impl From<Vec<StateEntry>> for StateStore {
    fn from(entries: Vec<StateEntry>) -> Self {
        entries.into_iter().map(|entry| (entry.entity_id, entry.state)).collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::json;

    use super::*;

    pub fn entity(state: &str, attributes: Value) -> EntityState {
        let Value::Object(attributes) = attributes else {
            panic!("attributes must be a JSON object");
        };
        EntityState { state: state.to_owned(), attributes }
    }

    pub fn store<'a>(entities: impl IntoIterator<Item = (&'a str, EntityState)>) -> StateStore {
        entities.into_iter().map(|(entity_id, state)| (entity_id.to_owned(), state)).collect()
    }

    pub fn empty_attributes() -> Value {
        json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    #[test]
    fn test_read_unconfigured_ok() -> Result {
        let store = StateStore::default();
        assert!(store.read(None)?.is_none());
        Ok(())
    }

    #[test]
    fn test_read_unknown_entity_fails() {
        let store = StateStore::default();
        assert!(store.read(Some("sensor.missing")).is_err());
    }

    #[test]
    fn test_read_known_entity_ok() -> Result {
        let store = store([("switch.heater", entity("on", empty_attributes()))]);
        let state = store.read(Some("switch.heater"))?.context("expected a state")?;
        assert_eq!(state.state, "on");
        Ok(())
    }

    #[test]
    fn test_deserialize_states_response_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            [
                {
                    "entity_id": "sensor.octopus_import_rates",
                    "state": "0.23",
                    "attributes": {"rates": []},
                    "last_changed": "2024-01-01T00:00:00+00:00",
                    "last_updated": "2024-01-01T00:00:00+00:00"
                },
                {
                    "entity_id": "input_boolean.hot_water",
                    "state": "off"
                }
            ]
        "#;
        let entries = serde_json::from_str::<Vec<StateEntry>>(RESPONSE)?;
        let store = StateStore::from(entries);
        assert_eq!(store.len(), 2);
        assert!(store.find("sensor.octopus_import_rates").is_some());
        assert_eq!(store.find("input_boolean.hot_water").map(|state| state.state.as_str()), Some("off"));
        Ok(())
    }
}
