mod api;
mod cli;
mod config;
mod engine;
mod prelude;
mod render;
mod state;

use clap::Parser;

use crate::{
    cli::{Args, Command, PlanArgs},
    config::ScheduleConfig,
    engine::{DisplayData, Pass},
    prelude::*,
};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().without_time().compact().init();

    match Args::parse().command {
        Command::Plan(args) => {
            let (config, data) = compute(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{}", render::schedule_table(&config, &data));
            }
            Ok(())
        }

        Command::Rates(args) => {
            let (config, data) = compute(&args)?;
            println!("{}", render::rates_table(&config, &data));
            Ok(())
        }
    }
}

fn compute(args: &PlanArgs) -> Result<(ScheduleConfig, DisplayData)> {
    let config = ScheduleConfig::from_toml_file(&args.config)?;
    let store = args.snapshot.load()?;
    info!(n_entities = store.len(), n_columns = config.columns.len(), "Computing the schedule…");
    let data = Pass::builder().store(&store).config(&config).compute()?;
    info!(n_rows = data.rows.len(), n_enabled_columns = data.columns.len(), "Computed");
    Ok((config, data))
}
