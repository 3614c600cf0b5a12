//! Deterministic input-synchronization core: frame clock, input bus, input
//! ring, game probe, replay log, state ring, prediction table, and the
//! rollback coordinator that ties them together.
//!
//! This crate is synchronous and has no knowledge of sockets; `framelock-net`
//! drives it from the far side of the wire, and `framelock-host` is the only
//! boundary it crosses into the emulator itself.

pub mod clock;
pub mod error;
pub mod game_probe;
pub mod input_bus;
pub mod input_ring;
pub mod pif;
pub mod prediction;
pub mod replay;
pub mod rollback;
pub mod state_ring;

pub use clock::FrameClock;
pub use error::{CoreError, Outcome};
pub use game_probe::{GameProbe, GameStatus, ProbeAddresses};
pub use input_bus::InputBus;
pub use input_ring::InputRing;
pub use pif::{handle_transaction, PifTransaction};
pub use prediction::{PredictionTable, PredictionView};
pub use replay::{ReplayReader, ReplayRecord, ReplayWriter};
pub use rollback::{RollbackCoordinator, RollbackRequest};
pub use state_ring::StateRing;
