//! Effect records and the per-variant extension capability
//!
//! Every effect owns a persisted [`EffectRecord`] plus an opaque extension block.
//! The record fields are shared by all variants; the extension is encoded and
//! decoded by the variant itself through [`EffectExtension`].

mod catalog;
mod registry;

pub use catalog::{ColorExtension, NoExtension, builtin_effects};
pub use registry::{EffectRegistry, RegistryError};

use serde_json::{Map, Value};

/// Variant-owned settings carried next to the shared record fields
pub trait EffectExtension: std::fmt::Debug {
    /// Write variant fields into a persisted record or a state notification
    fn encode_extra(&self, doc: &mut Map<String, Value>);

    /// Read back whichever variant fields are present in `doc`
    fn decode_extra(&mut self, doc: &Map<String, Value>);
}

/// Persisted per-effect configuration, keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectRecord {
    pub id: String,
    pub name: String,
    pub speed: u8,
    pub scale: u8,
    pub brightness: u8,
}

impl EffectRecord {
    pub fn new(id: &str, name: &str, speed: u8, scale: u8, brightness: u8) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            speed,
            scale,
            brightness,
        }
    }
}

/// Read the first present key as a 0-255 level, clamping out-of-range numbers
fn level(doc: &Map<String, Value>, keys: &[&str]) -> Option<u8> {
    let value = keys.iter().find_map(|key| doc.get(*key))?;
    let number = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))?;
    Some(number.clamp(0, 255) as u8)
}

#[derive(Debug)]
pub struct Effect {
    pub record: EffectRecord,
    extension: Box<dyn EffectExtension>,
}

impl Effect {
    pub fn new(record: EffectRecord, extension: Box<dyn EffectExtension>) -> Self {
        Self { record, extension }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Apply record levels and variant fields from a command or web-UI payload
    /// Accepts both the stored short keys (`s`, `l`, `b`) and the long command keys
    pub fn apply(&mut self, doc: &Map<String, Value>) {
        if let Some(speed) = level(doc, &["speed", "s"]) {
            self.record.speed = speed;
        }
        if let Some(scale) = level(doc, &["scale", "l"]) {
            self.record.scale = scale;
        }
        if let Some(brightness) = level(doc, &["brightness", "b"]) {
            self.record.brightness = brightness;
        }
        self.extension.decode_extra(doc);
    }

    /// Apply a stored record (`{i,n,s,l,b,...}`); the id has already been matched
    pub fn apply_persisted(&mut self, doc: &Map<String, Value>) {
        if let Some(name) = doc.get("n").and_then(Value::as_str) {
            self.record.name = name.to_string();
        }
        self.apply(doc);
    }

    /// Encode as a stored record
    pub fn encode(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("i".into(), Value::from(self.record.id.as_str()));
        doc.insert("n".into(), Value::from(self.record.name.as_str()));
        doc.insert("s".into(), Value::from(self.record.speed));
        doc.insert("l".into(), Value::from(self.record.scale));
        doc.insert("b".into(), Value::from(self.record.brightness));
        self.extension.encode_extra(&mut doc);
        Value::Object(doc)
    }

    /// Add variant fields to an outbound state document
    pub fn write_extra(&self, doc: &mut Map<String, Value>) {
        self.extension.encode_extra(doc);
    }
}
