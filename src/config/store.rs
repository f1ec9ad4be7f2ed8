//! In-memory mirror of every settings domain and the effect collection
//!
//! The store always reflects the last applied mutation, durable or not.
//! Persistence only ever sees it through the document builders below.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::settings::{ButtonSettings, ConnectionSettings, GeneralSettings, MatrixSettings, MqttSettings};
use crate::effects::{Effect, EffectRegistry};
use crate::platform::NetworkInfo;

#[derive(Debug, Serialize)]
pub struct Spectrometer {
    pub active: bool,
}

/// Borrowed view of the store in on-flash settings layout
#[derive(Debug, Serialize)]
pub struct SettingsDocument<'a> {
    #[serde(rename = "activeEffect")]
    pub active_effect: usize,
    #[serde(rename = "logInterval")]
    pub log_interval: u32,
    pub working: bool,
    pub matrix: &'a MatrixSettings,
    pub connection: &'a ConnectionSettings,
    pub mqtt: &'a MqttSettings,
    pub button: &'a ButtonSettings,
    pub spectrometer: Spectrometer,
}

#[derive(Debug)]
pub struct ConfigStore {
    pub general: GeneralSettings,
    pub matrix: MatrixSettings,
    pub connection: ConnectionSettings,
    pub mqtt: MqttSettings,
    pub button: ButtonSettings,
    effects: EffectRegistry,
}

impl ConfigStore {
    /// Defaults for a device whose hardware-derived id is `unique_id`
    pub fn new(unique_id: String, effects: EffectRegistry) -> Self {
        Self {
            general: GeneralSettings::default(),
            matrix: MatrixSettings::default(),
            connection: ConnectionSettings::default(),
            mqtt: MqttSettings::with_unique_id(unique_id),
            button: ButtonSettings::default(),
            effects,
        }
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    pub fn active_effect(&self) -> &Effect {
        self.effects.active()
    }

    pub fn active_effect_mut(&mut self) -> &mut Effect {
        self.effects.active_mut()
    }

    // ==========================================================================
    // Mutations
    // ==========================================================================

    pub fn set_working(&mut self, working: bool) {
        self.general.working_on = working;
    }

    pub fn activate_effect(&mut self, index: usize) -> bool {
        let activated = self.effects.activate(index);
        self.sync_active_index();
        activated
    }

    pub fn next_effect(&mut self) {
        self.effects.next();
        self.sync_active_index();
    }

    pub fn previous_effect(&mut self) {
        self.effects.previous();
        self.sync_active_index();
    }

    pub fn activate_effect_by_name(&mut self, name: &str) -> bool {
        let activated = self.effects.activate_by_name(name);
        self.sync_active_index();
        activated
    }

    pub fn activate_effect_by_id(&mut self, id: &str) -> bool {
        let activated = self.effects.activate_by_id(id);
        self.sync_active_index();
        activated
    }

    pub fn apply_to_active(&mut self, doc: &Map<String, Value>) {
        self.effects.apply_to_active(doc);
    }

    pub fn apply_to_effect(&mut self, id: &str, doc: &Map<String, Value>) -> bool {
        self.effects.apply_by_id(id, doc)
    }

    fn sync_active_index(&mut self) {
        self.general.active_effect_index = self.effects.active_index();
    }

    // ==========================================================================
    // Documents
    // ==========================================================================

    pub fn settings_document(&self) -> SettingsDocument<'_> {
        SettingsDocument {
            active_effect: self.general.active_effect_index,
            log_interval: self.general.log_interval_ms,
            working: self.general.working_on,
            matrix: &self.matrix,
            connection: &self.connection,
            mqtt: &self.mqtt,
            button: &self.button,
            spectrometer: Spectrometer {
                active: self.general.sound_control_on,
            },
        }
    }

    pub fn effects_document(&self) -> Value {
        self.effects.encode()
    }

    /// Layer a stored settings object over the current values
    pub fn decode_settings(&mut self, doc: &Value) {
        let Some(root) = doc.as_object() else {
            warn!("Settings document is not an object, ignoring");
            return;
        };

        let section = |key: &str| root.get(key).and_then(Value::as_object);
        if let Some(matrix) = section("matrix") {
            self.matrix.apply(matrix);
        }
        if let Some(connection) = section("connection") {
            self.connection.apply(connection);
        }
        if let Some(mqtt) = section("mqtt") {
            self.mqtt.apply(mqtt);
        }
        if let Some(button) = section("button") {
            self.button.apply(button);
        }
        self.general.apply(root);
    }

    /// Apply stored effect records, returning how many matched a known effect
    pub fn decode_effects(&mut self, doc: &Value) -> usize {
        let Some(records) = doc.as_array() else {
            warn!("Effects document is not an array, ignoring");
            return 0;
        };

        let applied = records
            .iter()
            .filter_map(Value::as_object)
            .filter(|record| self.effects.apply_persisted(record))
            .count();
        info!(stored = records.len(), applied = applied, "Loaded effect records");
        applied
    }

    /// Re-activate the effect recorded in the settings document
    /// Called once both domains are loaded; an index past the end falls back to the first effect
    pub fn restore_active_effect(&mut self) {
        let index = self.general.active_effect_index;
        if !self.effects.activate(index) {
            self.effects.activate(0);
        }
        self.sync_active_index();
    }

    /// Full state notification for pub/sub and web observers
    pub fn state_document(&self, network: &NetworkInfo) -> Value {
        let effect = self.effects.active();
        let mut doc = json!({
            "state": if self.general.working_on { "ON" } else { "OFF" },
            "brightness": effect.record.brightness,
            "speed": effect.record.speed,
            "scale": effect.record.scale,
            "effect": effect.name(),
            "localIp": network.local_ip,
            "webui": format!("http://{}", network.local_ip),
            "device": network.device,
        });
        if let Some(obj) = doc.as_object_mut() {
            effect.write_extra(obj);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::builtin_effects;

    fn store() -> ConfigStore {
        ConfigStore::new("a1b2c3".to_string(), EffectRegistry::new(builtin_effects()).unwrap())
    }

    #[test]
    fn test_default_settings_document() {
        let doc = serde_json::to_value(store().settings_document()).unwrap();

        assert_eq!(doc["working"], false);
        assert_eq!(doc["activeEffect"], 0);
        assert_eq!(doc["logInterval"], 0);
        assert_eq!(doc["matrix"]["order"], "grb");
        assert_eq!(doc["connection"]["mdns"], "firelamp");
        assert_eq!(doc["mqtt"]["uniqueId"], "a1b2c3");
        assert_eq!(doc["button"]["pin"], 255);
        assert_eq!(doc["spectrometer"]["active"], false);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut original = store();
        original.general.log_interval_ms = 2500;
        original.general.sound_control_on = true;
        original.set_working(true);
        original.activate_effect(3);
        original.matrix.width = 24;
        original.matrix.color_order = "rgb".to_string();
        original.connection.ssid = "home".to_string();
        original.connection.ntp_offset_minutes = -120;
        original.mqtt.host = "broker.local".to_string();
        original.mqtt.port = 8883;
        original.button.pin = 15;

        let encoded = serde_json::to_value(original.settings_document()).unwrap();

        let mut decoded = ConfigStore::new("different".to_string(), EffectRegistry::new(builtin_effects()).unwrap());
        decoded.decode_settings(&encoded);

        assert_eq!(decoded.general, original.general);
        assert_eq!(decoded.matrix, original.matrix);
        assert_eq!(decoded.connection, original.connection);
        assert_eq!(decoded.mqtt, original.mqtt);
        assert_eq!(decoded.button, original.button);
    }

    #[test]
    fn test_stored_unique_id_wins_over_derived() {
        let mut decoded = store();
        decoded.decode_settings(&json!({ "mqtt": { "uniqueId": "deadbeef" } }));
        assert_eq!(decoded.mqtt.unique_id, "deadbeef");
    }

    #[test]
    fn test_effects_roundtrip() {
        let mut original = store();
        original.activate_effect_by_id("Color");
        original.apply_to_active(json!({ "brightness": 12, "color": { "r": 1, "g": 2, "b": 3 } }).as_object().unwrap());
        original.apply_to_effect("Fire", json!({ "s": 200 }).as_object().unwrap());

        let encoded = original.effects_document();
        let mut decoded = store();
        assert_eq!(decoded.decode_effects(&encoded), 5);
        assert_eq!(decoded.effects_document(), encoded);
    }

    #[test]
    fn test_restore_active_effect_out_of_range() {
        let mut s = store();
        s.decode_settings(&json!({ "activeEffect": 42 }));
        s.restore_active_effect();
        assert_eq!(s.effects().active_index(), 0);
        assert_eq!(s.general.active_effect_index, 0);

        s.decode_settings(&json!({ "activeEffect": 2 }));
        s.restore_active_effect();
        assert_eq!(s.active_effect().id(), "Sparkles");
    }

    #[test]
    fn test_state_document_shape() {
        let mut s = store();
        s.set_working(true);
        s.activate_effect_by_id("Color");
        let network = NetworkInfo {
            local_ip: "192.168.1.20".to_string(),
            device: "esp32".to_string(),
        };

        let doc = s.state_document(&network);
        assert_eq!(doc["state"], "ON");
        assert_eq!(doc["effect"], "Color");
        assert_eq!(doc["webui"], "http://192.168.1.20");
        assert_eq!(doc["device"], "esp32");
        assert_eq!(doc["color"]["r"], 255);
    }
}
