//! Typed settings domains
//!
//! Each domain is a plain struct with defaults supplied at construction.
//! Encoding always emits every field (serde derive with the on-flash key names).
//! Decoding applies only the keys present in the stored object, so a partial
//! document layers over the defaults instead of replacing them.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::defaults;

/// Read `key` from `obj` as `T`
/// A missing key yields `None`; a key holding the wrong type is logged and skipped
pub(crate) fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.get(key)?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key = %key, value = %value, error = %e, "Ignoring settings field with unexpected type");
            None
        }
    }
}

/// Assign each present key to its target, leaving absent ones untouched
macro_rules! apply_if_present {
    ($obj:expr, { $($key:literal => $target:expr),+ $(,)? }) => {
        $(
            if let Some(value) = field($obj, $key) {
                $target = value;
            }
        )+
    };
}

/// Lamp behaviour settings stored at the top level of the settings document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneralSettings {
    pub working_on: bool,
    pub active_effect_index: usize,
    pub sound_control_on: bool,
    /// Heartbeat log period in milliseconds (0 = disabled)
    pub log_interval_ms: u32,
}

impl GeneralSettings {
    pub fn apply(&mut self, root: &Map<String, Value>) {
        apply_if_present!(root, {
            "activeEffect" => self.active_effect_index,
            "logInterval" => self.log_interval_ms,
            "working" => self.working_on,
        });

        if let Some(spectrometer) = root.get("spectrometer").and_then(Value::as_object) {
            apply_if_present!(spectrometer, {
                "active" => self.sound_control_on,
            });
        }
    }
}

/// LED matrix wiring and power limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixSettings {
    pub pin: u8,
    pub width: u16,
    pub height: u16,
    pub segments: u8,
    #[serde(rename = "type")]
    pub matrix_type: u8,
    #[serde(rename = "maxBrightness")]
    pub max_brightness: u8,
    #[serde(rename = "currentLimit")]
    pub current_limit_ma: u32,
    pub rotation: u8,
    #[serde(rename = "dither")]
    pub dither_on: bool,
    #[serde(rename = "order")]
    pub color_order: String,
}

impl Default for MatrixSettings {
    fn default() -> Self {
        Self {
            pin: 2,
            width: 16,
            height: 16,
            segments: 1,
            matrix_type: 0,
            max_brightness: 80,
            current_limit_ma: 5000,
            rotation: 0,
            dither_on: true,
            color_order: defaults::MATRIX_ORDER.to_string(),
        }
    }
}

impl MatrixSettings {
    pub fn apply(&mut self, obj: &Map<String, Value>) {
        apply_if_present!(obj, {
            "pin" => self.pin,
            "width" => self.width,
            "height" => self.height,
            "segments" => self.segments,
            "type" => self.matrix_type,
            "maxBrightness" => self.max_brightness,
            "currentLimit" => self.current_limit_ma,
            "rotation" => self.rotation,
            "dither" => self.dither_on,
            "order" => self.color_order,
        });
    }
}

/// Network identity, access point and station credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSettings {
    #[serde(rename = "mdns")]
    pub mdns_name: String,
    #[serde(rename = "apName")]
    pub ap_name: String,
    #[serde(rename = "apPassword")]
    pub ap_password: String,
    #[serde(rename = "ntpServer")]
    pub ntp_server: String,
    #[serde(rename = "ntpOffset")]
    pub ntp_offset_minutes: i32,
    pub hostname: String,
    pub ssid: String,
    pub bssid: String,
    pub password: String,
    pub login: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            mdns_name: defaults::MDNS_NAME.to_string(),
            ap_name: defaults::AP_NAME.to_string(),
            ap_password: String::new(),
            ntp_server: defaults::NTP_SERVER.to_string(),
            ntp_offset_minutes: 0,
            hostname: defaults::HOSTNAME.to_string(),
            ssid: String::new(),
            bssid: String::new(),
            password: String::new(),
            login: String::new(),
        }
    }
}

impl ConnectionSettings {
    pub fn apply(&mut self, obj: &Map<String, Value>) {
        apply_if_present!(obj, {
            "mdns" => self.mdns_name,
            "apName" => self.ap_name,
            "apPassword" => self.ap_password,
            "ntpServer" => self.ntp_server,
            "ntpOffset" => self.ntp_offset_minutes,
            "hostname" => self.hostname,
            "ssid" => self.ssid,
            "bssid" => self.bssid,
            "password" => self.password,
            "login" => self.login,
        });
    }
}

/// Pub/sub broker credentials and the device identity it announces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Derived from the hardware id on first boot, read back from flash afterwards
    #[serde(rename = "uniqueId")]
    pub unique_id: String,
    pub name: String,
    pub model: String,
    /// Not persisted
    #[serde(skip)]
    pub manufacturer: String,
}

impl MqttSettings {
    pub fn with_unique_id(unique_id: String) -> Self {
        Self {
            host: String::new(),
            port: defaults::MQTT_PORT,
            username: String::new(),
            password: String::new(),
            unique_id,
            name: defaults::MQTT_NAME.to_string(),
            model: defaults::MQTT_MODEL.to_string(),
            manufacturer: defaults::MANUFACTURER.to_string(),
        }
    }

    pub fn apply(&mut self, obj: &Map<String, Value>) {
        apply_if_present!(obj, {
            "host" => self.host,
            "port" => self.port,
            "username" => self.username,
            "password" => self.password,
            "uniqueId" => self.unique_id,
            "name" => self.name,
            "model" => self.model,
        });
    }
}

/// Physical button wiring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonSettings {
    pub pin: u8,
    #[serde(rename = "type")]
    pub button_type: u8,
    #[serde(rename = "state")]
    pub default_state: u8,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            pin: defaults::BUTTON_PIN_ABSENT,
            button_type: 0,
            default_state: 0,
        }
    }
}

impl ButtonSettings {
    pub fn is_fitted(&self) -> bool {
        self.pin != defaults::BUTTON_PIN_ABSENT
    }

    pub fn apply(&mut self, obj: &Map<String, Value>) {
        apply_if_present!(obj, {
            "pin" => self.pin,
            "type" => self.button_type,
            "state" => self.default_state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_matrix_apply_only_present_keys() {
        let mut matrix = MatrixSettings::default();
        matrix.apply(&object(json!({ "width": 32, "order": "rgb" })));

        assert_eq!(matrix.width, 32);
        assert_eq!(matrix.color_order, "rgb");
        // Untouched keys keep their defaults
        assert_eq!(matrix.height, 16);
        assert!(matrix.dither_on);
    }

    #[test]
    fn test_mistyped_field_is_skipped() {
        let mut matrix = MatrixSettings::default();
        matrix.apply(&object(json!({ "pin": "not a pin", "segments": 300, "rotation": 2 })));

        assert_eq!(matrix.pin, 2);
        assert_eq!(matrix.segments, 1);
        assert_eq!(matrix.rotation, 2);
    }

    #[test]
    fn test_matrix_encodes_flash_key_names() {
        let encoded = serde_json::to_value(MatrixSettings::default()).unwrap();
        let obj = encoded.as_object().unwrap();

        for key in ["pin", "width", "height", "segments", "type", "maxBrightness", "currentLimit", "rotation", "dither", "order"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 10);
        assert_eq!(encoded["order"], "grb");
    }

    #[test]
    fn test_mqtt_manufacturer_not_persisted() {
        let encoded = serde_json::to_value(MqttSettings::with_unique_id("abc123".to_string())).unwrap();
        assert_eq!(encoded["uniqueId"], "abc123");
        assert!(encoded.get("manufacturer").is_none());
    }

    #[test]
    fn test_general_reads_spectrometer_block() {
        let mut general = GeneralSettings::default();
        general.apply(&object(json!({
            "working": true,
            "activeEffect": 3,
            "logInterval": 1500,
            "spectrometer": { "active": true },
        })));

        assert!(general.working_on);
        assert_eq!(general.active_effect_index, 3);
        assert_eq!(general.log_interval_ms, 1500);
        assert!(general.sound_control_on);
    }

    #[test]
    fn test_button_absent_by_default() {
        let mut button = ButtonSettings::default();
        assert!(!button.is_fitted());

        button.apply(&object(json!({ "pin": 15, "type": 1 })));
        assert!(button.is_fitted());
        assert_eq!(button.button_type, 1);
        assert_eq!(button.default_state, 0);
    }
}
