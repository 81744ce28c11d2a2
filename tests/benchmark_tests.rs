//! Performance benchmarks for the hot packet paths

use shared::{
    CarSample, CrossingAction, Packet, ZoneKind, CHECKPOINT_FLAG_1, MPS_TO_KMH,
    SPEED_UNITS_PER_MPS,
};
use std::time::Instant;
use tracker::penalty::{escalate, Penalty, PenaltyRules, Stage, Violation};
use tracker::race_state::decode_race_length;
use tracker::session::{Session, SessionConfig};

fn populated_session(cars: u8) -> Session {
    let mut session = Session::new(SessionConfig {
        penalty_rules: Some(PenaltyRules::new(60.0)),
        ..Default::default()
    });

    for id in 1..=cars {
        session.handle_packet(Packet::ConnectionJoined {
            connection_id: id,
            login: format!("driver{}", id),
            display_name: format!("Driver {}", id),
            admin: false,
            flags: 0,
        });
        session.handle_packet(Packet::PlayerJoined {
            player_id: id,
            connection_id: id,
            display_name: format!("Driver {}", id),
            raw_name: format!("Driver {}", id),
            player_type: 0,
            flags: 0,
            plate: String::new(),
        });
    }

    session
}

/// Benchmarks speed sample processing with half the grid in the pit lane
#[test]
fn benchmark_multi_car_info() {
    let mut session = populated_session(40);
    for id in (1..=40).step_by(2) {
        session.handle_packet(Packet::ZoneCrossing {
            player_id: id,
            action: CrossingAction::CheckpointForward,
            zone: ZoneKind::Checkpoint,
            flags: CHECKPOINT_FLAG_1,
            heading: 0,
        });
    }
    assert_eq!(session.pit_lane().len(), 20);

    let units = (55.0 / MPS_TO_KMH * SPEED_UNITS_PER_MPS).ceil() as u16;
    let samples: Vec<CarSample> = (1..=40).map(|id| CarSample::new(id, units)).collect();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let effects = session.handle_packet(Packet::MultiCarInfo {
            cars: samples.clone(),
        });
        assert!(effects.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Speed samples: {} packets in {:?} ({:.2} μs/packet)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the penalty transition function
#[test]
fn benchmark_escalation() {
    let states = [
        Penalty::None,
        Penalty::DriveThrough(Stage::Pending),
        Penalty::DriveThrough(Stage::Served),
        Penalty::StopGo(Stage::Pending),
        Penalty::StopGo(Stage::Served),
        Penalty::Seconds30,
        Penalty::Seconds45,
    ];
    let violations = [Violation::None, Violation::Mild, Violation::Severe];

    let iterations = 100_000;
    let start = Instant::now();

    let mut issued = 0usize;
    for i in 0..iterations {
        let current = states[i % states.len()];
        let violation = violations[i % violations.len()];
        if escalate(current, violation, i % 5 == 0).is_some() {
            issued += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Escalation: {} transitions in {:?} ({} issued)",
        iterations, duration, issued
    );

    assert!(issued > 0);
    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Stress tests the session with many joins and leaves
#[test]
fn stress_test_roster_churn() {
    let start = Instant::now();

    for _ in 0..100 {
        let mut session = populated_session(32);
        for id in 1..=32u8 {
            session.handle_packet(Packet::PlayerLeft { player_id: id });
        }
        assert_eq!(session.registry().player_count(), 0);
    }

    let duration = start.elapsed();
    println!("Roster churn: 100 rounds in {:?}", duration);

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks race length decoding across the whole code range
#[test]
fn benchmark_race_length_decoding() {
    let iterations = 1_000;
    let start = Instant::now();

    let mut decoded = 0usize;
    for _ in 0..iterations {
        for code in 0..=u8::MAX {
            if decode_race_length(code).is_some() {
                decoded += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!("Race length decoding: {} codes in {:?}", decoded, duration);

    assert_eq!(decoded, iterations * 239);
    assert!(duration.as_millis() < 500);
}
