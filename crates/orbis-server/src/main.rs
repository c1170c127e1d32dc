//! Headless orbital simulation server.
//!
//! Loads `config.ron` (CLI overrides win), builds the area catalog and a demo
//! fleet, then ticks an authoritative simulation at the configured rate and
//! replicates it into an in-process replica through the wire codec.
//!
//! Run with: `cargo run -p orbis-server -- --dilation level3 --ticks 3600`
//! (add `--fast-forward` to skip to the first arrival).

mod fleet;
mod server;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use orbis_config::{CliArgs, Config, default_config_dir};
use orbis_orbital::{AreaCatalog, SpacecraftId};
use tracing::{error, info, warn};

use crate::server::{OrbitalServer, ServerError};

/// Real seconds between config hot-reload checks.
const CONFIG_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server stopped: {e}");
            eprintln!("orbis-server: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), ServerError> {
    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(args);

    orbis_log::init_logging(
        Some(&config_dir.join("logs")),
        cfg!(debug_assertions),
        Some(&config),
    );

    info!("Orbis orbital server");
    info!(
        "Tick rate: {} Hz | Dilation: {:?} | GC delay: {} s",
        config.simulation.tick_rate,
        config.simulation.time_dilation,
        config.simulation.orbit_gc_delay_secs
    );

    let catalog = match &config.catalog.path {
        Some(path) => AreaCatalog::load(path)?,
        None => AreaCatalog::builtin(),
    };
    info!(
        "Catalog: {} planets, {} areas",
        catalog.planets().len(),
        catalog.areas().len()
    );

    let fleet = Arc::new(fleet::demo_fleet(&[1, 2, 3]));
    let mut server = OrbitalServer::new(config.clone(), Arc::new(catalog), fleet);
    seed(&mut server)?;
    if args.fast_forward
        && let Some(time) = server.fast_forward()?
    {
        info!("Fast-forwarded to t={time:.1} min");
    }

    let tick_interval =
        Duration::from_secs_f64(1.0 / f64::from(config.simulation.tick_rate.max(1)));
    let mut last_frame = Instant::now();
    let mut last_reload = Instant::now();
    let mut total_ticks: u64 = 0;

    loop {
        std::thread::sleep(tick_interval);
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f64();
        last_frame = now;

        total_ticks += u64::from(server.update(dt)?);

        if now.duration_since(last_reload) >= CONFIG_RELOAD_INTERVAL {
            last_reload = now;
            match server.config().reload(&config_dir) {
                Ok(Some(mut reloaded)) => {
                    reloaded.apply_cli_overrides(args);
                    server.apply_config(reloaded);
                }
                Ok(None) => {}
                Err(e) => warn!("Config reload failed: {e}"),
            }
        }

        if let Some(limit) = args.ticks
            && total_ticks >= limit
        {
            break;
        }
    }

    let authority = server.authority();
    let replica = server.replica();
    info!(
        "Stopped after {} ticks at t={:.1} min: {} parked, {} in transfer \
         (replica at t={:.1}, {} tracked)",
        total_ticks,
        server.clock().current_time(),
        authority.orbits().spacecraft_count(),
        authority.trajectories().spacecraft_count(),
        replica.current_time(),
        replica.spacecraft_locations().len()
    );
    Ok(())
}

/// Docks tugs 1 and 2 at the station, parks tug 3 at the relay, and sends
/// the docked pair to the shipyard.
fn seed(server: &mut OrbitalServer) -> Result<(), ServerError> {
    let catalog = server.authority().catalog();
    let station = catalog
        .area_by_name("Station")
        .or_else(|| catalog.areas().first())
        .cloned();
    let relay = catalog.area_by_name("Relay").cloned();

    let Some(station) = station else {
        warn!("Catalog has no areas; nothing to simulate");
        return Ok(());
    };

    let convoy = [SpacecraftId(1), SpacecraftId(2)];
    let station_orbit = server.authority().area_orbit(&station);
    server.authority_mut().merge_orbit(&convoy, station_orbit)?;

    if let Some(relay) = relay {
        let relay_orbit = server.authority().area_orbit(&relay);
        server
            .authority_mut()
            .set_orbit(&[SpacecraftId(3)], relay_orbit)?;
    }

    if let Err(e) = server.plan_transfer(&station.name, "Shipyard", &convoy) {
        warn!("Initial transfer not planned: {e}");
    }
    server.replicate()
}
