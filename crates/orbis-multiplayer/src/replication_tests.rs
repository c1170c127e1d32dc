//! Unit tests for registry replication.

use std::sync::Arc;

use orbis_orbital::{
    AreaCatalog, AreaId, Fleet, OrbitalError, Role, SimulationSettings, Trajectory,
};

use super::*;

fn simulation(role: Role) -> OrbitalSimulation {
    OrbitalSimulation::new(
        Arc::new(AreaCatalog::builtin()),
        Arc::new(Fleet::new()),
        role,
        SimulationSettings::default(),
    )
}

fn station_to_shipyard(sim: &OrbitalSimulation) -> Trajectory {
    let parameters = sim
        .prepare_trajectory_parameters(AreaId(0), AreaId(1), 0.0)
        .unwrap();
    sim.compute_trajectory(&parameters, 400.0).unwrap()
}

/// Server with spacecraft 1 and 2 docked at the station, 3 alone at the relay.
fn populated_server() -> OrbitalSimulation {
    let mut sim = simulation(Role::Authority);
    let station = sim.area_orbit(sim.catalog().area(AreaId(0)).unwrap());
    let relay = sim.area_orbit(sim.catalog().area(AreaId(2)).unwrap());
    sim.merge_orbit(&[SpacecraftId(1), SpacecraftId(2)], station)
        .unwrap();
    sim.set_orbit(&[SpacecraftId(3)], relay).unwrap();
    sim
}

#[test]
fn test_first_batch_is_full_snapshot() {
    let sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(7);

    let msgs = server.replicate(&sim).unwrap();
    let batch = &msgs[&7];
    assert_eq!(batch.updates.len(), 3);
    assert!(batch.removals.is_empty());
    assert_eq!(batch.updates[0].spacecraft, SpacecraftId(1));
    assert!(matches!(
        batch.updates[2].decode_state().unwrap(),
        SpacecraftState::Parked(_)
    ));
}

#[test]
fn test_unchanged_registries_produce_empty_batch() {
    let mut sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    server.replicate(&sim).unwrap();

    // Locations move every tick but the records do not.
    sim.tick(500.0);
    let msgs = server.replicate(&sim).unwrap();
    assert!(msgs[&1].is_empty());
    assert_eq!(msgs[&1].current_time, 500.0);
}

#[test]
fn test_changes_and_removals_are_diffed() {
    let mut sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    server.replicate(&sim).unwrap();

    let trajectory = station_to_shipyard(&sim);
    sim.commit_trajectory(trajectory, &[SpacecraftId(1)]).unwrap();
    let msgs = server.replicate(&sim).unwrap();
    let batch = &msgs[&1];
    assert_eq!(batch.updates.len(), 1);
    assert_eq!(batch.updates[0].spacecraft, SpacecraftId(1));
    assert_eq!(
        batch.updates[0].decode_state().unwrap(),
        SpacecraftState::InTransfer(trajectory)
    );

    // A spacecraft with no record at all is reported removed.
    let mut sim = simulation(Role::Authority);
    let mut server = ReplicationServer::new();
    server.add_client(1);
    server
        .shadows
        .get_mut(&1)
        .unwrap()
        .spacecraft
        .insert(SpacecraftId(40), ShadowRecord::default());
    sim.tick(1.0);
    let msgs = server.replicate(&sim).unwrap();
    assert_eq!(msgs[&1].removals, vec![SpacecraftId(40)]);
}

#[test]
fn test_late_joining_client_gets_snapshot() {
    let sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    server.replicate(&sim).unwrap();

    server.add_client(2);
    let msgs = server.replicate(&sim).unwrap();
    assert!(msgs[&1].is_empty());
    assert_eq!(msgs[&2].updates.len(), 3);

    server.remove_client(1);
    assert_eq!(server.client_count(), 1);
}

#[test]
fn test_replica_cannot_be_replicated_from() {
    let replica = simulation(Role::Replica);
    let mut server = ReplicationServer::new();
    assert!(matches!(
        server.replicate(&replica),
        Err(ReplicationError::NotAuthority)
    ));
}

#[test]
fn test_client_rebuilds_shared_records() {
    let mut sim = populated_server();
    let trajectory = station_to_shipyard(&sim);
    sim.commit_trajectory(trajectory, &[SpacecraftId(1), SpacecraftId(2)])
        .unwrap();

    let mut server = ReplicationServer::new();
    server.add_client(1);
    let msgs = server.replicate(&sim).unwrap();

    let mut replica = simulation(Role::Replica);
    let mut client = ReplicationClient::new();
    assert!(client.apply(&mut replica, &msgs[&1]).unwrap());

    assert_eq!(replica.trajectories().len(), 1);
    assert_eq!(replica.trajectories().spacecraft_count(), 2);
    assert_eq!(replica.orbits().len(), 1);
    assert_eq!(
        replica.spacecraft_state(SpacecraftId(2)),
        sim.spacecraft_state(SpacecraftId(2))
    );

    for time in [30.0, 300.0] {
        sim.tick(time);
        replica.tick(time);
        assert_eq!(
            sim.spacecraft_location(SpacecraftId(1)),
            replica.spacecraft_location(SpacecraftId(1))
        );
    }
}

#[test]
fn test_client_keeps_separate_records_separate() {
    let mut sim = simulation(Role::Authority);
    let station = sim.area_orbit(sim.catalog().area(AreaId(0)).unwrap());
    sim.set_orbit(&[SpacecraftId(1), SpacecraftId(2)], station)
        .unwrap();

    let mut server = ReplicationServer::new();
    server.add_client(1);
    let mut replica = simulation(Role::Replica);
    let mut client = ReplicationClient::new();
    client
        .apply(&mut replica, &server.replicate(&sim).unwrap()[&1])
        .unwrap();
    assert_eq!(sim.orbits().len(), 2);
    assert_eq!(replica.orbits().len(), 2);

    // Docking the pair only changes the grouping, which still replicates.
    sim.merge_orbit(&[SpacecraftId(1), SpacecraftId(2)], station)
        .unwrap();
    let msgs = server.replicate(&sim).unwrap();
    assert_eq!(msgs[&1].updates.len(), 2);
    assert_eq!(msgs[&1].updates[0].shared_with, vec![SpacecraftId(2)]);
    client.apply(&mut replica, &msgs[&1]).unwrap();
    assert_eq!(replica.orbits().len(), 1);
    let mut docked = replica.orbits().entry(SpacecraftId(2)).unwrap().identifiers.clone();
    docked.sort();
    assert_eq!(docked, vec![SpacecraftId(1), SpacecraftId(2)]);
}

#[test]
fn test_client_ignores_stale_batches_and_unknown_removals() {
    let mut replica = simulation(Role::Replica);
    let mut client = ReplicationClient::new();

    let newer = ReplicationMessages {
        tick: 10,
        current_time: 5.0,
        updates: Vec::new(),
        removals: vec![SpacecraftId(99)],
    };
    assert!(client.apply(&mut replica, &newer).unwrap());
    // Replays are fine.
    assert!(client.apply(&mut replica, &newer).unwrap());

    let older = ReplicationMessages {
        tick: 3,
        ..Default::default()
    };
    assert!(!client.apply(&mut replica, &older).unwrap());
    assert_eq!(client.last_tick(), Some(10));
    assert_eq!(client.server_time(), 5.0);
}

#[test]
fn test_corrupt_update_leaves_replica_untouched() {
    let mut replica = simulation(Role::Replica);
    let mut client = ReplicationClient::new();
    let sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    let mut batch = server.replicate(&sim).unwrap().remove(&1).unwrap();
    batch.updates[1].state = vec![0xFF];

    assert!(matches!(
        client.apply(&mut replica, &batch),
        Err(ReplicationError::Decode(_))
    ));
    assert!(replica.orbits().is_empty());
    assert_eq!(client.last_tick(), None);
}

#[test]
fn test_authority_rejects_batches() {
    let mut authority = simulation(Role::Authority);
    let sim = populated_server();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    let msgs = server.replicate(&sim).unwrap();

    let mut client = ReplicationClient::new();
    let err = client.apply(&mut authority, &msgs[&1]).unwrap_err();
    assert!(matches!(
        err,
        ReplicationError::Simulation(OrbitalError::NotReplica)
    ));
}

#[test]
fn test_batch_wire_round_trip() {
    let mut sim = populated_server();
    let trajectory = station_to_shipyard(&sim);
    sim.commit_trajectory(trajectory, &[SpacecraftId(3)]).unwrap();
    let mut server = ReplicationServer::new();
    server.add_client(1);
    let batch = server.replicate(&sim).unwrap().remove(&1).unwrap();

    let config = CompressionConfig::with_threshold(64);
    let bytes = batch.encode(&config).unwrap();
    assert_eq!(bytes[0], crate::compression::FRAME_LZ4);
    assert_eq!(ReplicationMessages::decode(&bytes).unwrap(), batch);

    assert!(matches!(
        ReplicationMessages::decode(&[]),
        Err(ReplicationError::Compression(_))
    ));
}

#[test]
fn test_batch_is_json_friendly() {
    let batch = ReplicationMessages {
        tick: 4,
        current_time: 1.5,
        updates: Vec::new(),
        removals: vec![SpacecraftId(2)],
    };
    let json = serde_json::to_string(&batch).unwrap();
    let decoded: ReplicationMessages = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, batch);
}
