//! Typed property values and override sets

use crate::hash::hash_str;
use crate::message::Url;
use glam::{Quat, Vec3, Vec4};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Built-in instance properties, addressed without a component id.
pub static POSITION: Lazy<u64> = Lazy::new(|| hash_str("position"));
pub static ROTATION: Lazy<u64> = Lazy::new(|| hash_str("rotation"));
pub static SCALE: Lazy<u64> = Lazy::new(|| hash_str("scale"));
pub static EULER: Lazy<u64> = Lazy::new(|| hash_str("euler"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Hash(u64),
    Url(Url),
    Vector3(Vec3),
    Vector4(Vec4),
    Quat(Quat),
    Bool(bool),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Number(_) => "number",
            PropertyValue::Hash(_) => "hash",
            PropertyValue::Url(_) => "url",
            PropertyValue::Vector3(_) => "vector3",
            PropertyValue::Vector4(_) => "vector4",
            PropertyValue::Quat(_) => "quat",
            PropertyValue::Bool(_) => "bool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("instance handle is stale")]
    StaleInstance,

    #[error("component {component_id:#018x} not found on instance")]
    ComponentNotFound { component_id: u64 },

    #[error("property {property_id:#018x} not found")]
    NotFound { property_id: u64 },

    #[error("property {property_id:#018x} expects a {expected} value")]
    TypeMismatch {
        property_id: u64,
        expected: &'static str,
    },
}

/// Ordered id -> value list; later inserts of the same id replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet {
    entries: Vec<(u64, PropertyValue)>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: u64, value: PropertyValue) -> Self {
        self.insert(id, value);
        self
    }

    pub fn with_named(self, name: &str, value: PropertyValue) -> Self {
        self.with(hash_str(name), value)
    }

    pub fn insert(&mut self, id: u64, value: PropertyValue) {
        match self.entries.iter_mut().find(|(key, _)| *key == id) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((id, value)),
        }
    }

    pub fn get(&self, id: u64) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &PropertyValue)> {
        self.entries.iter().map(|(id, value)| (*id, value))
    }

    /// Copy of `self` with `overrides` applied on top.
    pub fn merged(&self, overrides: &PropertySet) -> PropertySet {
        let mut merged = self.clone();
        for (id, value) in overrides.iter() {
            merged.insert(id, *value);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_on_merge() {
        let base = PropertySet::new()
            .with_named("speed", PropertyValue::Number(1.0))
            .with_named("enabled", PropertyValue::Bool(true));
        let overrides = PropertySet::new().with_named("speed", PropertyValue::Number(4.0));

        let merged = base.merged(&overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.get(hash_str("speed")),
            Some(&PropertyValue::Number(4.0))
        );
        assert_eq!(
            merged.get(hash_str("enabled")),
            Some(&PropertyValue::Bool(true))
        );
    }
}
