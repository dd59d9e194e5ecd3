use std::time::Duration;

use ureq::Agent;

use crate::{
    prelude::*,
    state::{StateEntry, StateStore},
};

pub struct Api {
    client: Agent,
    base_url: String,
    access_token: String,
}

impl Api {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        let client =
            Agent::config_builder().timeout_global(Some(Duration::from_secs(10))).build().into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            access_token: access_token.to_owned(),
        }
    }

    /// Fetch the full entity snapshot from `GET /api/states`.
    #[instrument(skip_all)]
    pub fn get_states(&self) -> Result<StateStore> {
        info!("Fetching the state snapshot…");
        let entries: Vec<StateEntry> = self
            .client
            .get(format!("{}/api/states", self.base_url))
            .header("authorization", &format!("Bearer {}", self.access_token))
            .call()
            .context("failed to call the states API")?
            .body_mut()
            .read_json()
            .context("failed to deserialize the states response")?;
        info!(n_entities = entries.len(), "Fetched");
        Ok(StateStore::from(entries))
    }
}
