use std::error::Error;

use colored::*;
use tracing::{error, info, span, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cvrp_planner::config::constant::SYNTHETIC_LOCATIONS;
use cvrp_planner::config::PlannerConfig;
use cvrp_planner::evaluation::{validate, Report};
use cvrp_planner::fixtures::data_generator::{generate_instance, input_files_present, load_instance};
use cvrp_planner::partition::KMeansClustering;
use cvrp_planner::setup::init::Instance;
use cvrp_planner::solver::{MicroLpOracle, Plan, Planner};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .pretty(),
        )
        .init();
}

fn load(config: &PlannerConfig) -> Result<Instance, Box<dyn Error>> {
    let span = span!(Level::INFO, "setup");
    let _guard = span.enter();

    if input_files_present(config) {
        info!("Reading instance from {}", config.locations_path);
        Ok(load_instance(config)?)
    } else {
        warn!(
            "Input files not found, generating {} synthetic locations (seed {})",
            SYNTHETIC_LOCATIONS, config.seed
        );
        Ok(generate_instance(SYNTHETIC_LOCATIONS, config.seed, config)?)
    }
}

fn print_subsets(plan: &Plan) {
    println!("{}", "SUBSETS".bold());
    for outcome in &plan.outcomes {
        let line = format!(
            "  subset {:>3}: {:>3} locations, {:>4} pallets, K = {:<3} {}",
            outcome.subset.id,
            outcome.subset.customers().len(),
            outcome.demand,
            outcome.route_count,
            outcome.status
        );
        if outcome.status.is_solved() {
            println!("{}", line.green());
        } else {
            println!("{}", line.red());
        }
    }
}

fn print_report(report: &Report) {
    println!("{}", "ROUTES (locations | pallets | path)".bold());
    for line in report.lines() {
        println!("  {}", line);
    }
    println!(
        "{}",
        format!(
            "{} routes, {} locations, {} pallets, total cost {:.2}",
            report.route_count, report.locations_covered, report.total_pallets, report.total_cost
        )
        .green()
        .bold()
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let config = PlannerConfig::from_env()?;
    let instance = load(&config)?;
    info!(
        "Instance: {} locations, {} pallets, Q = {}",
        instance.num_locations(),
        instance.demands().iter().sum::<u64>(),
        instance.capacity()
    );

    let clustering = KMeansClustering::default();
    let solver = MicroLpOracle::new(config.solver_timeout);
    let plan = Planner::new(&instance, &config, &clustering, &solver).plan()?;
    print_subsets(&plan);

    let report = match validate(&plan.solution, &instance) {
        Ok(report) => report.with_subsets(&plan.outcomes),
        Err(err) => {
            error!("{}", err);
            println!("{}", format!("INVALID SOLUTION: {}", err).red().bold());
            return Err(err.into());
        }
    };
    print_report(&report);

    report.write_csv(&config.report_csv_path)?;
    report.write_json(&config.report_json_path)?;
    info!(
        "Report written to {} and {}",
        config.report_csv_path, config.report_json_path
    );
    Ok(())
}
