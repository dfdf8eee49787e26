pub mod control;
pub mod reading;

pub use control::{ControlDocument, ControlPatch, RemoteTimestamp};
pub use reading::SensorReading;
