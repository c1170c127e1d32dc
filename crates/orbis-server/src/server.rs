//! The server loop: an authoritative simulation ticking under a dilated
//! clock, replicated over the wire codec into an in-process replica.

use std::sync::Arc;

use orbis_config::{Config, ConfigError};
use orbis_multiplayer::{
    CompressionConfig, ReplicationClient, ReplicationError, ReplicationMessages, ReplicationServer,
};
use orbis_orbital::{
    AreaCatalog, CatalogError, FAST_FORWARD_STEP_MINUTES, GameClock, OrbitalError,
    OrbitalSimulation, PropulsionProvider, Role, ServerTickSchedule, SpacecraftId, Trajectory,
};

/// Client id of the in-process replica.
pub const REPLICA_CLIENT_ID: u64 = 1;

/// Server failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The area catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// A simulation command failed.
    #[error(transparent)]
    Orbital(#[from] OrbitalError),
    /// Replication failed.
    #[error(transparent)]
    Replication(#[from] ReplicationError),
    /// No area with this name.
    #[error("unknown area '{0}'")]
    UnknownAreaName(String),
}

/// Authority, replica and the machinery between them.
pub struct OrbitalServer {
    config: Config,
    clock: GameClock,
    schedule: ServerTickSchedule,
    authority: OrbitalSimulation,
    replica: OrbitalSimulation,
    replication: ReplicationServer,
    client: ReplicationClient,
    compression: CompressionConfig,
    ticks_per_replication: u64,
    in_transfer: usize,
}

impl OrbitalServer {
    /// Builds both simulations from `config`.
    pub fn new(
        config: Config,
        catalog: Arc<AreaCatalog>,
        propulsion: Arc<dyn PropulsionProvider>,
    ) -> Self {
        let settings = config.simulation.settings();
        let authority = OrbitalSimulation::new(
            catalog.clone(),
            propulsion.clone(),
            Role::Authority,
            settings,
        );
        let replica = OrbitalSimulation::new(catalog, propulsion, Role::Replica, settings);

        let mut clock = GameClock::new(0.0);
        clock.set_dilation(config.simulation.time_dilation);

        let mut replication = ReplicationServer::new();
        replication.add_client(REPLICA_CLIENT_ID);

        let schedule = ServerTickSchedule::with_tick_rate(config.simulation.tick_rate);
        Self {
            clock,
            ticks_per_replication: schedule.interval_ticks(config.network.replication_rate_hz),
            schedule,
            authority,
            replica,
            replication,
            client: ReplicationClient::new(),
            compression: CompressionConfig::with_threshold(config.network.compression_threshold),
            in_transfer: 0,
            config,
        }
    }

    /// The authoritative simulation.
    pub fn authority(&self) -> &OrbitalSimulation {
        &self.authority
    }

    /// Mutable access to the authoritative simulation.
    pub fn authority_mut(&mut self) -> &mut OrbitalSimulation {
        &mut self.authority
    }

    /// The replicated simulation.
    pub fn replica(&self) -> &OrbitalSimulation {
        &self.replica
    }

    /// The game clock.
    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Plans and commits a transfer between two named areas, departing now.
    ///
    /// Returns `Ok(None)` when the spacecraft cannot fly it.
    pub fn plan_transfer(
        &mut self,
        source: &str,
        destination: &str,
        spacecraft: &[SpacecraftId],
    ) -> Result<Option<Trajectory>, ServerError> {
        let catalog = self.authority.catalog();
        let source_id = catalog
            .area_by_name(source)
            .ok_or_else(|| ServerError::UnknownAreaName(source.to_string()))?
            .id;
        let destination_id = catalog
            .area_by_name(destination)
            .ok_or_else(|| ServerError::UnknownAreaName(destination.to_string()))?
            .id;

        let parameters =
            self.authority
                .prepare_trajectory_parameters(source_id, destination_id, 0.0)?;
        let trajectory = self.authority.compute_trajectory(
            &parameters,
            self.config.simulation.default_phasing_altitude_km,
        )?;

        if let Err(reason) = self.authority.check_trajectory(&trajectory, spacecraft) {
            tracing::warn!(source, destination, %reason, "Transfer refused");
            return Ok(None);
        }

        self.authority.commit_trajectory(trajectory, spacecraft)?;
        tracing::info!(
            source,
            destination,
            arrival = trajectory.arrival_time(),
            "Transfer under way"
        );
        Ok(Some(trajectory))
    }

    /// Feeds `real_dt_secs` of wall time in. Returns the ticks processed.
    pub fn update(&mut self, real_dt_secs: f64) -> Result<u32, ServerError> {
        let ticks = self.schedule.accumulate(real_dt_secs);
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(ticks)
    }

    fn step(&mut self) -> Result<(), ServerError> {
        let now = self.clock.advance(self.schedule.tick_duration_secs());
        self.authority.tick(now);

        let in_transfer = self.authority.trajectories().spacecraft_count();
        if in_transfer != self.in_transfer {
            tracing::info!(
                time = now,
                in_transfer,
                parked = self.authority.orbits().spacecraft_count(),
                "Fleet status changed"
            );
            self.in_transfer = in_transfer;
        }

        if self.schedule.is_due(self.ticks_per_replication) {
            self.replicate()?;
        }
        Ok(())
    }

    /// Runs the authority at full speed to the next arrival, in clock steps
    /// of at most [`FAST_FORWARD_STEP_MINUTES`], then completes every
    /// trajectory that has arrived and replicates.
    ///
    /// Returns the time reached, or `None` when nothing is in transfer.
    pub fn fast_forward(&mut self) -> Result<Option<f64>, ServerError> {
        let Some(target) = self.authority.next_event_time() else {
            tracing::debug!("Nothing to fast-forward to");
            return Ok(None);
        };
        tracing::info!(from = self.clock.current_time(), to = target, "Fast-forwarding");

        let mut steps = 0u64;
        while self.clock.current_time() < target {
            let previous = self.clock.current_time();
            let now = self
                .clock
                .fast_forward_to((previous + FAST_FORWARD_STEP_MINUTES).min(target));
            if now <= previous {
                break;
            }
            self.authority.tick(now);
            steps += 1;
        }

        let now = self.clock.current_time();
        let arrived: Vec<SpacecraftId> = self
            .authority
            .trajectories()
            .iter()
            .filter(|(_, trajectory)| trajectory.arrival_time() <= now)
            .map(|(identifier, _)| identifier)
            .collect();
        self.authority.complete_trajectory(&arrived)?;
        self.in_transfer = self.authority.trajectories().spacecraft_count();

        tracing::info!(time = now, steps, arrived = arrived.len(), "Fast-forward finished");
        self.replicate()?;
        Ok(Some(now))
    }

    /// Replicates to every client; the in-process replica receives its
    /// batch through the wire codec.
    pub fn replicate(&mut self) -> Result<(), ServerError> {
        let batches = self.replication.replicate(&self.authority)?;
        for (client_id, batch) in batches {
            let bytes = batch.encode(&self.compression)?;
            let received = ReplicationMessages::decode(&bytes)?;
            if client_id == REPLICA_CLIENT_ID {
                self.client.apply(&mut self.replica, &received)?;
                self.replica.tick(self.client.server_time());
            }
        }
        Ok(())
    }

    /// Applies a reloaded configuration.
    pub fn apply_config(&mut self, config: Config) {
        self.clock.set_dilation(config.simulation.time_dilation);
        if config.simulation.tick_rate != self.config.simulation.tick_rate {
            self.schedule = ServerTickSchedule::with_tick_rate(config.simulation.tick_rate);
        }
        self.compression = CompressionConfig::with_threshold(config.network.compression_threshold);
        self.ticks_per_replication = self
            .schedule
            .interval_ticks(config.network.replication_rate_hz);
        if config.simulation.orbit_gc_delay_secs != self.config.simulation.orbit_gc_delay_secs {
            tracing::warn!("orbit_gc_delay_secs changes apply on restart");
        }
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::demo_fleet;
    use orbis_orbital::{Fleet, TimeDilation};

    fn server(dilation: TimeDilation) -> OrbitalServer {
        let mut config = Config::default();
        config.simulation.time_dilation = dilation;
        OrbitalServer::new(
            config,
            Arc::new(AreaCatalog::builtin()),
            Arc::new(demo_fleet(&[1, 2, 3])),
        )
    }

    fn dock_at_station(server: &mut OrbitalServer, ids: &[SpacecraftId]) {
        let station = server
            .authority()
            .catalog()
            .area_by_name("Station")
            .unwrap()
            .clone();
        let orbit = server.authority().area_orbit(&station);
        server.authority_mut().merge_orbit(ids, orbit).unwrap();
    }

    #[test]
    fn test_replication_interval() {
        assert_eq!(server(TimeDilation::Normal).ticks_per_replication, 6);

        let mut fast = Config::default();
        fast.network.replication_rate_hz = 1000;
        let server = OrbitalServer::new(
            fast,
            Arc::new(AreaCatalog::builtin()),
            Arc::new(Fleet::new()),
        );
        assert_eq!(server.ticks_per_replication, 1);
    }

    #[test]
    fn test_fast_forward_to_arrival() {
        let mut server = server(TimeDilation::Normal);
        assert_eq!(server.fast_forward().unwrap(), None);

        let convoy = [SpacecraftId(1), SpacecraftId(2)];
        dock_at_station(&mut server, &convoy);
        let trajectory = server
            .plan_transfer("Station", "Shipyard", &convoy)
            .unwrap()
            .unwrap();

        let reached = server.fast_forward().unwrap().unwrap();
        assert_eq!(reached, trajectory.arrival_time());
        assert_eq!(server.clock().current_time(), reached);
        assert_eq!(server.authority().current_time(), reached);
        // Hundreds of minutes in bounded steps, not one jump.
        assert!(server.authority().tick_count() > 10);

        let authority = server.authority();
        assert!(authority.trajectories().is_empty());
        assert_eq!(authority.orbits().len(), 1);
        let orbit = authority.spacecraft_orbit(SpacecraftId(1)).unwrap();
        assert_eq!(orbit.geometry.altitude, 800.0);
        assert_eq!(orbit.epoch, reached);

        for id in convoy {
            assert_eq!(server.replica().spacecraft_state(id), authority.spacecraft_state(id));
        }
        assert_eq!(server.fast_forward().unwrap(), None);
    }

    #[test]
    fn test_convoy_arrives_and_replica_follows() {
        let mut server = server(TimeDilation::Level3);
        let convoy = [SpacecraftId(1), SpacecraftId(2)];
        dock_at_station(&mut server, &convoy);

        let trajectory = server
            .plan_transfer("Station", "Shipyard", &convoy)
            .unwrap()
            .unwrap();
        server.replicate().unwrap();
        assert_eq!(server.replica().trajectories().spacecraft_count(), 2);

        // Level3 at 60 Hz is two game minutes per tick.
        let mut seconds = 0;
        while server.clock().current_time() < trajectory.arrival_time() + 10.0 {
            server.update(1.0).unwrap();
            seconds += 1;
            assert!(seconds < 100, "clock stalled");
        }
        server.replicate().unwrap();

        let authority = server.authority();
        assert!(authority.trajectories().is_empty());
        assert_eq!(authority.orbits().len(), 1);
        let orbit = authority.spacecraft_orbit(SpacecraftId(1)).unwrap();
        assert_eq!(orbit.geometry.altitude, 800.0);

        let replica = server.replica();
        for id in convoy {
            assert_eq!(replica.spacecraft_state(id), authority.spacecraft_state(id));
            assert_eq!(replica.spacecraft_location(id), authority.spacecraft_location(id));
        }
    }

    #[test]
    fn test_transfer_refused_without_propulsion() {
        let mut server = OrbitalServer::new(
            Config::default(),
            Arc::new(AreaCatalog::builtin()),
            Arc::new(Fleet::new()),
        );
        let refused = server
            .plan_transfer("Station", "Shipyard", &[SpacecraftId(1)])
            .unwrap();
        assert!(refused.is_none());
        assert!(server.authority().trajectories().is_empty());

        assert!(matches!(
            server.plan_transfer("Station", "Nowhere", &[SpacecraftId(1)]),
            Err(ServerError::UnknownAreaName(_))
        ));
    }

    #[test]
    fn test_apply_config_changes_dilation() {
        let mut server = server(TimeDilation::Normal);
        let mut config = server.config().clone();
        config.simulation.time_dilation = TimeDilation::Level2;
        config.network.replication_rate_hz = 60;
        server.apply_config(config);

        assert_eq!(server.clock().dilation(), TimeDilation::Level2);
        assert_eq!(server.ticks_per_replication, 1);
    }
}
