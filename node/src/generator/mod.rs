pub mod beacon;

pub use beacon::{BeaconConfig, SimulatedBeacon};
