pub mod hal;

pub use hal::{HalError, Module, SharedModule, TopologyConfig};
