use serde::{Deserialize, Serialize};

/// Speed units per metre per second in car telemetry samples
pub const SPEED_UNITS_PER_MPS: f64 = 327.68;
pub const MPS_TO_KMH: f64 = 3.6;

/// Request id used by the relay when it asks the server for its version on connect
pub const VERSION_REQUEST_ID: u8 = 1;

pub const PLAYER_TYPE_FEMALE: u8 = 1;
pub const PLAYER_TYPE_AI: u8 = 2;
pub const PLAYER_TYPE_REMOTE: u8 = 4;

/// Checkpoint flag bits carried by a zone crossing
pub const CHECKPOINT_FLAG_1: u8 = 1;
pub const CHECKPOINT_FLAG_2: u8 = 2;

/// Wire-level penalty values as reported by the server
pub mod penalty_value {
    pub const NONE: u8 = 0;
    pub const DRIVE_THROUGH: u8 = 1;
    pub const DRIVE_THROUGH_VALID: u8 = 2;
    pub const STOP_GO: u8 = 3;
    pub const STOP_GO_VALID: u8 = 4;
    pub const SECONDS_30: u8 = 5;
    pub const SECONDS_45: u8 = 6;
}

/// Decoded packets delivered by the relay, in server arrival order
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Version {
        request_id: u8,
        product: String,
        version: String,
    },
    MultiplayerStarted {
        request_id: u8,
    },
    SessionCleared,

    ConnectionJoined {
        connection_id: u8,
        login: String,
        display_name: String,
        admin: bool,
        flags: u8,
    },
    ConnectionLeft {
        connection_id: u8,
    },

    PlayerJoined {
        player_id: u8,
        connection_id: u8,
        display_name: String,
        raw_name: String,
        player_type: u8,
        flags: u16,
        plate: String,
    },
    PlayerLeft {
        player_id: u8,
    },
    PlayerPitted {
        player_id: u8,
    },
    PlayerRenamed {
        connection_id: u8,
        display_name: String,
        plate: String,
    },
    PlayerTookOver {
        player_id: u8,
        new_connection_id: u8,
    },
    LapCompleted {
        player_id: u8,
        laps_done: u16,
    },

    SessionState {
        race_laps: u8,
    },
    ZoneCrossing {
        player_id: u8,
        action: CrossingAction,
        zone: ZoneKind,
        flags: u8,
        heading: u8,
    },
    MultiCarInfo {
        cars: Vec<CarSample>,
    },
    PenaltyUpdate {
        player_id: u8,
        old_value: u8,
        new_value: u8,
        reason: u8,
    },
}

/// One car entry of a multi-car snapshot
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CarSample {
    pub player_id: u8,
    pub speed: u16,
}

impl CarSample {
    pub fn new(player_id: u8, speed: u16) -> Self {
        Self { player_id, speed }
    }

    pub fn speed_kmh(&self) -> f64 {
        speed_to_kmh(self.speed)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CrossingAction {
    CheckpointForward,
    CheckpointReverse,
    CircleEnter,
    CircleLeave,
}

/// Classification of the layout object that was crossed
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Checkpoint,
    Circle,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenaltyReason {
    #[default]
    Unknown,
    Admin,
    WrongWay,
    FalseStart,
    Speeding,
    StopShort,
    StopLate,
}

impl From<u8> for PenaltyReason {
    fn from(value: u8) -> Self {
        match value {
            1 => PenaltyReason::Admin,
            2 => PenaltyReason::WrongWay,
            3 => PenaltyReason::FalseStart,
            4 => PenaltyReason::Speeding,
            5 => PenaltyReason::StopShort,
            6 => PenaltyReason::StopLate,
            _ => PenaltyReason::Unknown,
        }
    }
}

/// Listings the tracker asks the server to (re)send
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    Connections,
    Players,
    State,
}

/// Effects sent back to the relay
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Administrative text command, e.g. `/p_dt login`
    Command(String),
    /// Message shown only on the host's screen
    LocalMessage(String),
    Request(SyncRequest),
}

pub fn is_ai(player_type: u8) -> bool {
    player_type & PLAYER_TYPE_AI != 0
}

pub fn speed_to_meters_per_second(speed: u16) -> f64 {
    speed as f64 / SPEED_UNITS_PER_MPS
}

pub fn speed_to_kmh(speed: u16) -> f64 {
    speed_to_meters_per_second(speed) * MPS_TO_KMH
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn kmh_to_speed(kmh: f64) -> u16 {
        (kmh / MPS_TO_KMH * SPEED_UNITS_PER_MPS).ceil() as u16
    }

    #[test]
    fn test_speed_conversion() {
        assert_approx_eq!(speed_to_meters_per_second(32768), 100.0, 1e-9);
        assert_approx_eq!(speed_to_kmh(32768), 360.0, 1e-9);
        assert_approx_eq!(speed_to_kmh(0), 0.0, 1e-9);
    }

    #[test]
    fn test_speed_units_round_trip() {
        for kmh in [1.0, 60.0, 61.0, 80.5, 250.0] {
            let speed = kmh_to_speed(kmh);
            assert!(speed_to_kmh(speed) >= kmh);
            assert!(speed_to_kmh(speed - 1) < kmh);
        }
    }

    #[test]
    fn test_car_sample_speed() {
        let sample = CarSample::new(3, 9102);
        assert_approx_eq!(sample.speed_kmh(), 100.0, 0.01);
    }

    #[test]
    fn test_player_type_flags() {
        assert!(is_ai(PLAYER_TYPE_AI));
        assert!(is_ai(PLAYER_TYPE_AI | PLAYER_TYPE_REMOTE));
        assert!(!is_ai(PLAYER_TYPE_FEMALE | PLAYER_TYPE_REMOTE));
        assert!(!is_ai(0));
    }

    #[test]
    fn test_penalty_reason_from_wire() {
        assert_eq!(PenaltyReason::from(0), PenaltyReason::Unknown);
        assert_eq!(PenaltyReason::from(4), PenaltyReason::Speeding);
        assert_eq!(PenaltyReason::from(6), PenaltyReason::StopLate);
        assert_eq!(PenaltyReason::from(200), PenaltyReason::Unknown);
    }

    #[test]
    fn test_packet_serialization_multi_car_info() {
        let packet = Packet::MultiCarInfo {
            cars: vec![CarSample::new(1, 1000), CarSample::new(2, 2000)],
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::MultiCarInfo { cars } => {
                assert_eq!(cars.len(), 2);
                assert_eq!(cars[0].player_id, 1);
                assert_eq!(cars[1].speed, 2000);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_outbound_serialization() {
        let outbound = Outbound::Command("/p_dt racer".to_string());
        let serialized = bincode::serialize(&outbound).unwrap();
        let deserialized: Outbound = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, outbound);
    }
}
