//! # Pit Lane Tracker Library
//!
//! This library follows a racing simulator session from the decoded packet
//! stream and enforces the pit lane speed limit. It keeps a registry of the
//! connections and cars on track, detects when cars enter and leave the pit
//! lane, and hands out or clears penalties through admin commands.
//!
//! ## Core Responsibilities
//!
//! ### Session Mirroring
//! Connections and players are tracked as the simulator reports them:
//! - Joins, leaves, renames and takeovers
//! - Lap counts and the configured race length
//! - Full resets when the host clears or restarts the session
//!
//! ### Pit Lane Detection
//! Checkpoint crossings are turned into pit lane entries and exits from the
//! checkpoint flags and the direction of travel. Cars spawning on the pit
//! start circle are entered after a short settle delay.
//!
//! ### Penalty Enforcement
//! Speed samples for cars inside the pit lane are compared with the limit.
//! Violations escalate the car's current penalty, and leaving the pit lane
//! after serving a penalty clears it.
//!
//! ## Architecture Design
//!
//! ### Single Consumer Event Loop
//! Packets and fired timers are applied to one [`session::Session`] in the
//! order they arrive. Handlers never perform I/O themselves; they return
//! [`effects::Effect`] values which the loop turns into outbound messages
//! and sleeping timer tasks.
//!
//! ### Generation Tokens
//! Every scheduled timer carries a token. Cancelling a timer just forgets
//! the token, so a timer that fires late is recognised and ignored.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Connection and player lookup by id, with ownership links between them.
//!
//! ### Race State Module (`race_state`)
//! Race length decoding and the final laps check.
//!
//! ### Pit Lane Module (`pit_lane`)
//! Crossing classification and pit lane membership.
//!
//! ### Penalty Module (`penalty`)
//! The penalty state machine and the speed limit rules.
//!
//! ### Network Module (`network`)
//! UDP transport towards the packet relay and the event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tracker::network::Server;
//! use tracker::penalty::PenaltyRules;
//! use tracker::session::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(SessionConfig {
//!         penalty_rules: Some(PenaltyRules::new(60.0)),
//!         ..Default::default()
//!     });
//!
//!     let server = Server::new("127.0.0.1:29998", session).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod effects;
pub mod names;
pub mod network;
pub mod penalty;
pub mod pit_lane;
pub mod race_state;
pub mod registry;
pub mod session;
