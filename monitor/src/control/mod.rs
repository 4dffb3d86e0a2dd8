pub mod bridge;

pub use bridge::{ControlBridge, LatestModel};
