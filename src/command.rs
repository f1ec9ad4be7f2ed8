//! Inbound mutation commands
//!
//! Two shapes reach the lamp: the web UI's `{event, data}` envelope and the
//! flat object published on the pub/sub set topic. Both are applied straight
//! to the [`ConfigStore`]; dirty-marking and notifications belong to the caller.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::constants::effects::COLOR_ID;
use crate::queue::CommandOrigin;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("command is not a json object")]
    NotAnObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The store changed (or may have); persist and notify
    Applied,
    /// Recognized as well-formed but carried nothing to apply
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    #[serde(default)]
    event: Value,
    #[serde(default)]
    data: Value,
}

/// Route a raw payload by the channel it arrived on
pub fn apply(store: &mut ConfigStore, origin: CommandOrigin, payload: &str) -> Result<Outcome, CommandError> {
    match origin {
        CommandOrigin::Config => apply_config(store, payload),
        CommandOrigin::State => apply_state(store, payload),
    }
}

fn parse_object(payload: &str) -> Result<Map<String, Value>, CommandError> {
    match serde_json::from_str(payload)? {
        Value::Object(obj) => Ok(obj),
        _ => Err(CommandError::NotAnObject),
    }
}

pub fn apply_config(store: &mut ConfigStore, payload: &str) -> Result<Outcome, CommandError> {
    let envelope: ConfigEnvelope = serde_json::from_value(Value::Object(parse_object(payload)?))?;

    match envelope.event.as_str().unwrap_or_default() {
        "WORKING" => match envelope.data.as_bool() {
            Some(working) => {
                store.set_working(working);
                Ok(Outcome::Applied)
            }
            None => {
                warn!(data = %envelope.data, "WORKING event without a boolean, ignoring");
                Ok(Outcome::Ignored)
            }
        },
        "EFFECTS_CHANGED" => Ok(apply_effect_change(store, &envelope.data)),
        _ => {
            debug!(event = %envelope.event, "Ignoring config event");
            Ok(Outcome::Ignored)
        }
    }
}

fn apply_effect_change(store: &mut ConfigStore, data: &Value) -> Outcome {
    let Some(fields) = data.as_object() else {
        warn!("EFFECTS_CHANGED data is not an object, ignoring");
        return Outcome::Ignored;
    };
    let Some(id) = fields.get("i").and_then(Value::as_str) else {
        warn!("EFFECTS_CHANGED without an effect id, ignoring");
        return Outcome::Ignored;
    };

    if store.active_effect().id() == id {
        store.apply_to_active(fields);
        return Outcome::Applied;
    }
    if store.apply_to_effect(id, fields) {
        Outcome::Applied
    } else {
        warn!(id = %id, "EFFECTS_CHANGED for unknown effect, ignoring");
        Outcome::Ignored
    }
}

/// Effect switching (`effect`, `switchTo`, `color`) only happens alongside a
/// `state` field; level fields always apply to whichever effect ends up active.
/// A name that matches no effect leaves the active one in place.
pub fn apply_state(store: &mut ConfigStore, payload: &str) -> Result<Outcome, CommandError> {
    let obj = parse_object(payload)?;

    if let Some(state) = obj.get("state") {
        store.set_working(state.as_str() == Some("ON"));
        switch_effect(store, &obj);
    }

    store.apply_to_active(&obj);
    Ok(Outcome::Applied)
}

fn switch_effect(store: &mut ConfigStore, obj: &Map<String, Value>) {
    if let Some(name) = obj.get("effect").and_then(Value::as_str) {
        if !store.activate_effect_by_name(name) {
            warn!(effect = %name, active = %store.active_effect().name(), "No effect with that name, keeping current");
        }
    } else if let Some(direction) = obj.get("switchTo").and_then(Value::as_str) {
        match direction {
            "next" => store.next_effect(),
            "prev" => store.previous_effect(),
            other => warn!(switch_to = %other, "Unknown switch direction"),
        }
    }

    if obj.contains_key("color") && !store.activate_effect_by_id(COLOR_ID) {
        warn!("Color requested but no color effect is registered");
    }
}
