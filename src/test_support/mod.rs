//! Test fixtures: a scripted upstream handler, a toggleable remote store, a
//! manual clock, and an assembled gateway harness.

pub mod clock;
pub mod harness;
pub mod mock;

pub use clock::ManualClock;
pub use harness::{TestGateway, fixture_config};
pub use mock::{MockTrackerHandler, RecordedCall, UnreliableStore};
