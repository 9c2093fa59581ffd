//! Poll results keyed by register.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::RegisterValue;

/// Decoded values from one poll cycle.
///
/// Every register visited by the cycle has an entry; `None` marks a read or
/// decode failure. Successful writes patch entries in place until the next
/// cycle replaces the snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    taken_at: DateTime<Utc>,
    values: BTreeMap<String, Option<RegisterValue>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            taken_at: Utc::now(),
            values: BTreeMap::new(),
        }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Move the timestamp to now, once the cycle's last read is in.
    pub fn stamp(&mut self) {
        self.taken_at = Utc::now();
    }

    /// Value for `key`, or `None` when it was absent or never polled.
    pub fn get(&self, key: &str) -> Option<&RegisterValue> {
        self.values.get(key).and_then(Option::as_ref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Record the outcome for `key`; `None` records an absent value.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<RegisterValue>) {
        self.values.insert(key.into(), value);
    }

    /// Overwrite `key` with a value just written to the device.
    pub fn patch(&mut self, key: impl Into<String>, value: RegisterValue) {
        self.values.insert(key.into(), Some(value));
    }

    /// Keys whose last read or decode failed.
    pub fn absent_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&RegisterValue>)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StatusBits;

    #[test]
    fn test_stamp_moves_timestamp_forward() {
        let mut snapshot = Snapshot::new();
        let started = snapshot.taken_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        snapshot.stamp();
        assert!(snapshot.taken_at() > started);
    }

    #[test]
    fn test_absent_and_missing_keys() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("battery_soc", Some(RegisterValue::Scaled(87.0)));
        snapshot.insert("grid_power", None);

        assert_eq!(snapshot.get("battery_soc"), Some(&RegisterValue::Scaled(87.0)));
        assert_eq!(snapshot.get("grid_power"), None);
        assert!(snapshot.contains_key("grid_power"));
        assert!(!snapshot.contains_key("pv1_power"));
        assert_eq!(snapshot.absent_keys().collect::<Vec<_>>(), vec!["grid_power"]);
    }

    #[test]
    fn test_patch_replaces_absent_value() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("export_limit", None);
        snapshot.patch("export_limit", RegisterValue::Integer(800));

        assert_eq!(snapshot.get("export_limit"), Some(&RegisterValue::Integer(800)));
        assert_eq!(snapshot.absent_keys().count(), 0);
    }

    #[test]
    fn test_serializes_absent_as_null() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("model_name", Some(RegisterValue::Text("ONE".into())));
        snapshot.insert("status1", Some(RegisterValue::Bits(StatusBits::new(0x0004))));
        snapshot.insert("pv1_power", None);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["values"]["model_name"], "ONE");
        assert_eq!(json["values"]["status1"]["operation"], true);
        assert!(json["values"]["pv1_power"].is_null());
        assert!(json["taken_at"].is_string());
    }
}
