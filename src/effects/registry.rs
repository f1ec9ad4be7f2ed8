//! Ordered effect collection with a single active entry

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::Effect;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("effect collection is empty")]
    Empty,

    #[error("duplicate effect id: '{0}'")]
    DuplicateId(String),
}

/// Effects in collection order; ids are unique
#[derive(Debug)]
pub struct EffectRegistry {
    effects: Vec<Effect>,
    active: usize,
}

impl EffectRegistry {
    pub fn new(effects: Vec<Effect>) -> Result<Self, RegistryError> {
        if effects.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for effect in &effects {
            if !seen.insert(effect.id()) {
                return Err(RegistryError::DuplicateId(effect.id().to_string()));
            }
        }
        Ok(Self { effects, active: 0 })
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &Effect {
        &self.effects[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Effect {
        &mut self.effects[self.active]
    }

    pub fn get(&self, id: &str) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id() == id)
    }

    /// Returns false (and leaves the active effect alone) for an out-of-range index
    pub fn activate(&mut self, index: usize) -> bool {
        if index >= self.effects.len() {
            warn!(index = index, count = self.effects.len(), "Effect index out of range");
            return false;
        }
        self.active = index;
        debug!(index = index, id = %self.effects[index].id(), "Activated effect");
        true
    }

    pub fn next(&mut self) {
        let index = (self.active + 1) % self.effects.len();
        self.activate(index);
    }

    pub fn previous(&mut self) {
        let index = (self.active + self.effects.len() - 1) % self.effects.len();
        self.activate(index);
    }

    pub fn activate_by_name(&mut self, name: &str) -> bool {
        match self.effects.iter().position(|e| e.name() == name) {
            Some(index) => self.activate(index),
            None => false,
        }
    }

    pub fn activate_by_id(&mut self, id: &str) -> bool {
        match self.effects.iter().position(|e| e.id() == id) {
            Some(index) => self.activate(index),
            None => false,
        }
    }

    pub fn apply_to_active(&mut self, doc: &Map<String, Value>) {
        self.active_mut().apply(doc);
    }

    /// Returns false when no effect has this id
    pub fn apply_by_id(&mut self, id: &str, doc: &Map<String, Value>) -> bool {
        match self.effects.iter_mut().find(|e| e.id() == id) {
            Some(effect) => {
                effect.apply(doc);
                true
            }
            None => false,
        }
    }

    /// Decode one stored record onto the effect with the same id
    /// Records for ids this firmware does not know are skipped
    pub fn apply_persisted(&mut self, doc: &Map<String, Value>) -> bool {
        let Some(id) = doc.get("i").and_then(Value::as_str) else {
            warn!("Stored effect record without an id, skipping");
            return false;
        };
        match self.effects.iter_mut().find(|e| e.id() == id) {
            Some(effect) => {
                effect.apply_persisted(doc);
                true
            }
            None => {
                warn!(id = %id, "Stored effect record has no matching effect, skipping");
                false
            }
        }
    }

    pub fn encode(&self) -> Value {
        Value::Array(self.effects.iter().map(Effect::encode).collect())
    }

    pub fn names(&self) -> Vec<&str> {
        self.effects.iter().map(Effect::name).collect()
    }
}
