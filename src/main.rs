use cbs_mapf::config::{Cli, Config};
use cbs_mapf::scenario::{Scenario, Schedule};
use cbs_mapf::solver::{Solver, CBS};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(config_file) = cli.config.as_ref() {
        let config_str = std::fs::read_to_string(config_file)
            .with_context(|| format!("cannot read config file: {config_file}"))?;
        Config::from_yaml_str(&config_str)
            .with_context(|| format!("error with config file: {config_file}"))?
    } else {
        Config::default()
    }
    .override_from_command_line(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if cli.config.is_none() {
        info!("No config file specified, using default config");
    }

    let env = Scenario::load_from_file(&config.input_path)?
        .into_environment()
        .with_context(|| format!("invalid instance: {}", config.input_path))?;
    info!(
        "Loaded {}x{} grid with {} agents",
        env.map.width,
        env.map.height,
        env.agents.len()
    );

    let mut cbs_solver = CBS::new(&env);
    let Some(cbs_solution) = cbs_solver.solve(&config) else {
        error!("cbs solve fails");
        bail!("no feasible plan for {}", config.input_path);
    };
    if !cbs_solution.verify(&env) {
        bail!("cbs returned an invalid plan");
    }

    Schedule::from_solution(&cbs_solution).write_to_file(&config.output_path)?;
    info!("Plan cost {} written to {}", cbs_solution.cost, config.output_path);
    Ok(())
}
