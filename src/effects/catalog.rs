//! Built-in effect variants
//!
//! Rendering lives outside this crate; a variant here is only the settings it
//! persists and reports.

use serde_json::{Map, Value, json};

use super::{Effect, EffectExtension, EffectRecord};
use crate::constants::effects::COLOR_ID;

/// Variant with no fields beyond the shared record
#[derive(Debug, Default)]
pub struct NoExtension;

impl EffectExtension for NoExtension {
    fn encode_extra(&self, _doc: &mut Map<String, Value>) {}

    fn decode_extra(&mut self, _doc: &Map<String, Value>) {}
}

/// Solid color fill, `{"color": {"r", "g", "b"}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorExtension {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for ColorExtension {
    fn default() -> Self {
        Self { r: 255, g: 255, b: 255 }
    }
}

impl EffectExtension for ColorExtension {
    fn encode_extra(&self, doc: &mut Map<String, Value>) {
        doc.insert("color".into(), json!({ "r": self.r, "g": self.g, "b": self.b }));
    }

    fn decode_extra(&mut self, doc: &Map<String, Value>) {
        let Some(color) = doc.get("color").and_then(Value::as_object) else {
            return;
        };
        for (key, channel) in [("r", &mut self.r), ("g", &mut self.g), ("b", &mut self.b)] {
            if let Some(value) = color.get(key).and_then(Value::as_i64) {
                *channel = value.clamp(0, 255) as u8;
            }
        }
    }
}

/// Factory effect list in collection order
pub fn builtin_effects() -> Vec<Effect> {
    vec![
        Effect::new(EffectRecord::new("Fire", "Fire", 15, 50, 80), Box::new(NoExtension)),
        Effect::new(EffectRecord::new("Rainbow", "Rainbow", 20, 30, 80), Box::new(NoExtension)),
        Effect::new(EffectRecord::new("Sparkles", "Sparkles", 30, 40, 80), Box::new(NoExtension)),
        Effect::new(EffectRecord::new("TripleComets", "Comets", 25, 60, 80), Box::new(NoExtension)),
        Effect::new(EffectRecord::new(COLOR_ID, "Color", 1, 1, 80), Box::new(ColorExtension::default())),
    ]
}
