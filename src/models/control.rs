//! Control-document models.
//!
//! `ControlDocument` mirrors the shared remote record that drives the UV-C
//! lamp; its wire field names are a contract with the device side and must
//! not change. `ControlPatch` is the merge-write half of that contract:
//! only the named fields are updated, everything else keeps its value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Timestamp as stored remotely: either epoch milliseconds or an ISO-8601
/// string, depending on which writer touched the document last.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteTimestamp(pub DateTime<Utc>);

impl From<DateTime<Utc>> for RemoteTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Serialize for RemoteTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for RemoteTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            MillisFloat(f64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
            Raw::MillisFloat(ms) => Utc
                .timestamp_millis_opt(ms as i64)
                .single()
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| serde::de::Error::custom(format!("bad timestamp {text:?}: {err}"))),
        }?;

        Ok(Self(parsed))
    }
}

/// The shared remote control record. System of record for the purification
/// cycle; any client session may read or write it, writes are merged.
///
/// All fields are optional on the wire: readers treat a missing flag as
/// `false`, a missing `pausedElapsed` as zero, and a missing `exposureTime`
/// as the configured default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlDocument {
    pub active: bool,
    pub paused: bool,
    pub paused_elapsed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uvc_start_time: Option<RemoteTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<RemoteTimestamp>,
}

/// A partial write against [`ControlDocument`]. Absent fields are left
/// untouched by the merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_elapsed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uvc_start_time: Option<RemoteTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<RemoteTimestamp>,
}

impl ControlPatch {
    /// Merge this patch into `doc`, field by field.
    pub fn apply(&self, doc: &mut ControlDocument) {
        if let Some(active) = self.active {
            doc.active = active;
        }
        if let Some(paused) = self.paused {
            doc.paused = paused;
        }
        if let Some(paused_elapsed) = self.paused_elapsed {
            doc.paused_elapsed = paused_elapsed;
        }
        if let Some(start) = self.uvc_start_time {
            doc.uvc_start_time = Some(start);
        }
        if let Some(exposure) = self.exposure_time {
            doc.exposure_time = Some(exposure);
        }
        if let Some(updated) = self.last_updated {
            doc.last_updated = Some(updated);
        }
    }
}
