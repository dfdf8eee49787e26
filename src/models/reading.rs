use serde::{Deserialize, Serialize};

use super::control::RemoteTimestamp;

/// One sensor reading as recorded by the remote store. Measurement fields
/// default to zero when the device omits them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorReading {
    pub id: String,
    pub turbidity: f64,
    pub temperature: f64,
    pub conductivity: f64,
    pub water_level: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RemoteTimestamp>,
}
