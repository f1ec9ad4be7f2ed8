//! Pub/sub topic layout and the discovery document
//!
//! Connection handling is left to the transport; this only decides where
//! things are published and what the broker-side integration is told.

use serde_json::{Value, json};

use crate::config::ConfigStore;
use crate::constants::topics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub base: String,
    pub set: String,
    pub state: String,
    pub config: String,
    pub available: String,
}

impl Topics {
    pub fn new(unique_id: &str) -> Self {
        let base = format!("{}{}", topics::DISCOVERY_PREFIX, unique_id);
        Self {
            set: format!("{base}{}", topics::SET_SUFFIX),
            state: format!("{base}{}", topics::STATE_SUFFIX),
            config: format!("{base}{}", topics::CONFIG_SUFFIX),
            available: format!("{base}{}", topics::AVAILABLE_SUFFIX),
            base,
        }
    }
}

pub fn client_id(name: &str) -> String {
    format!("{}{}", topics::CLIENT_ID_PREFIX, name)
}

/// Light entity announcement, published retained on the config topic
pub fn discovery_document(store: &ConfigStore, topics: &Topics) -> Value {
    let mqtt = &store.mqtt;
    json!({
        "~": topics.base,
        "name": mqtt.name,
        "uniq_id": mqtt.unique_id,
        "cmd_t": "~/set",
        "stat_t": "~/state",
        "avty_t": "~/available",
        "pl_avail": "true",
        "pl_not_avail": "false",
        "schema": "json",
        "brightness": true,
        "effect": true,
        "rgb": true,
        "json_attr_t": "~/state",
        "dev": {
            "mf": mqtt.manufacturer,
            "name": mqtt.name,
            "mdl": mqtt.model,
            "ids": [mqtt.unique_id],
        },
        "effect_list": store.effects().names(),
    })
}
