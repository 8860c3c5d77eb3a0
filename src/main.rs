//! NASA Explorer - browse NASA missions, exoplanets and satellites
//!
//! A command-line front end over the aggregator. Live data is fetched with
//! retries and proxy fallback; when NASA's APIs are unreachable a bundled
//! snapshot is shown along with an offline notice.

use clap::Parser;
use serde::Serialize;
use std::process;

use nasa_explorer::cli::{Cli, Request, RunConfig};
use nasa_explorer::config::ExplorerConfig;
use nasa_explorer::error::ServiceError;
use nasa_explorer::service::{ApiResponse, ApiService, DashboardStats};
use nasa_explorer::sources::{Exoplanet, Mission, Satellite};

/// Exit status for invalid arguments or configuration
const EXIT_USAGE: i32 = 2;
/// Exit status when an upstream rate limit stops the request
const EXIT_RATE_LIMITED: i32 = 3;

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env("NASA_EXPLORER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Formats an optional measurement, or a dash when the archive omits it
fn measure(value: Option<f64>, precision: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.*} {}", precision, v, unit),
        None => "-".to_string(),
    }
}

fn print_missions(missions: &[Mission]) {
    for mission in missions {
        let year = mission
            .launch_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "TBD".to_string());
        println!(
            "{:<40} {:<10} {:<20} {}",
            mission.name, mission.status, mission.mission_type, year
        );
    }
}

fn print_exoplanets(planets: &[Exoplanet]) {
    for planet in planets {
        println!(
            "{:<20} {:<14} {:>10} {:>8} {:>12}{}",
            planet.name,
            planet.planet_type.label(),
            measure(planet.radius, 2, "R⊕"),
            measure(planet.temperature, 0, "K"),
            measure(planet.distance, 1, "ly"),
            if planet.habitable { "  habitable" } else { "" }
        );
    }
}

fn print_satellites(satellites: &[Satellite]) {
    for satellite in satellites {
        println!(
            "{:<24} {:<4} {:>9.0} km {:>7.1} min  {}",
            satellite.name,
            satellite.orbit_class.as_str(),
            satellite.altitude,
            satellite.orbital_period,
            satellite.purpose
        );
    }
}

fn print_stats(stats: &DashboardStats) {
    println!("Missions:    {} ({} active)", stats.total_missions, stats.active_missions);
    println!(
        "Exoplanets:  {} ({} potentially habitable)",
        stats.total_exoplanets, stats.habitable_exoplanets
    );
    println!("Satellites:  {}", stats.total_satellites);
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a listing, then the offline notice on stderr when it applies
fn emit<T: Serialize>(
    response: ApiResponse<T>,
    json: bool,
    print: fn(&[T]),
) -> Result<(), serde_json::Error> {
    if json {
        print_json(&response)?;
    } else if response.data.is_empty() {
        println!("No results.");
    } else {
        print(&response.data);
    }
    if let Some(notice) = response.notice() {
        eprintln!("{}", notice);
    }
    Ok(())
}

async fn run(service: &ApiService, run_config: &RunConfig) -> Result<(), Box<dyn std::error::Error>> {
    let json = run_config.json;
    match &run_config.request {
        Request::Missions(query) => emit(service.get_missions(query).await?, json, print_missions)?,
        Request::Exoplanets(query) => {
            emit(service.get_exoplanets(query).await?, json, print_exoplanets)?
        }
        Request::Satellites(query) => {
            emit(service.get_satellites(query).await?, json, print_satellites)?
        }
        Request::Stats => {
            let stats = service.dashboard_stats().await;
            if json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
            if stats.offline {
                eprintln!("{}", nasa_explorer::service::OFFLINE_NOTICE);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let run_config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(EXIT_USAGE);
        }
    };

    init_tracing(run_config.log_level);

    let mut config = match ExplorerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(EXIT_USAGE);
        }
    };
    run_config.apply_to(&mut config);

    if config.uses_demo_key() && !config.mock_api {
        tracing::info!("using the shared DEMO_KEY, set NASA_API_KEY for higher rate limits");
    }

    let service = ApiService::from_config(config)?;

    if let Err(err) = run(&service, &run_config).await {
        if let Some(ServiceError::RateLimited { .. }) = err.downcast_ref::<ServiceError>() {
            eprintln!("error: {}", err);
            eprintln!("rate limited, try later");
            process::exit(EXIT_RATE_LIMITED);
        }
        return Err(err);
    }

    Ok(())
}
