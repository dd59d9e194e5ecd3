use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{api::home_assistant, prelude::*, state::StateStore};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute and render the appliance schedule table.
    Plan(PlanArgs),

    /// Render the merged tariff slots without evaluating any columns.
    Rates(PlanArgs),
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Path to the schedule configuration.
    #[clap(long, env = "OCTOPLAN_CONFIG", default_value = "octoplan.toml")]
    pub config: PathBuf,

    #[clap(flatten)]
    pub snapshot: SnapshotArgs,

    /// Print the computed table data as JSON instead of rendering it.
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct SnapshotArgs {
    /// Read the state snapshot from a JSON dump instead of the API.
    #[clap(long = "states-file")]
    pub states_file: Option<PathBuf>,

    /// Home Assistant API base URL. For example: `http://localhost:8123`.
    #[clap(long = "home-assistant-api-base-url", env = "HOME_ASSISTANT_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Home Assistant API access token.
    #[clap(long = "home-assistant-access-token", env = "HOME_ASSISTANT_ACCESS_TOKEN")]
    pub access_token: Option<String>,
}

impl SnapshotArgs {
    pub fn load(&self) -> Result<StateStore> {
        if let Some(path) = &self.states_file {
            return StateStore::from_snapshot_file(path);
        }
        match (&self.base_url, &self.access_token) {
            (Some(base_url), Some(access_token)) => {
                home_assistant::Api::new(base_url, access_token).get_states()
            }
            _ => bail!(
                "either `--states-file` or both `--home-assistant-api-base-url` \
                 and `--home-assistant-access-token` are required"
            ),
        }
    }
}
