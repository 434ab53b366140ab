//! Declarative attribute descriptors.

use crate::attr::{AttrType, Value};

/// A declarative description of an attribute to create.
///
/// Mirrors the shape of a serialized attribute record: a type tag, naming,
/// optional default/value/bounds, and state flags. Compound attributes carry
/// their children recursively.
#[derive(Clone, Debug)]
pub struct AttrSpec {
    pub long_name: String,
    pub short_name: String,
    pub ty: AttrType,
    /// Array (multi) attribute: elements are created on demand.
    pub is_array: bool,
    pub default: Option<Value>,
    /// Initial value to apply after creation.
    pub value: Option<Value>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub soft_min: Option<f64>,
    pub soft_max: Option<f64>,
    pub keyable: bool,
    pub channel_box: bool,
    pub locked: bool,
    pub storable: bool,
    pub writable: bool,
    pub connectable: bool,
    /// Field names for enum attributes, in index order.
    pub enum_fields: Vec<String>,
    /// Children for compound attributes.
    pub children: Vec<AttrSpec>,
}

impl AttrSpec {
    /// New spec with the given long name (short name defaults to the same).
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        let long_name = name.into();
        Self {
            short_name: long_name.clone(),
            long_name,
            ty,
            is_array: false,
            default: None,
            value: None,
            min: None,
            max: None,
            soft_min: None,
            soft_max: None,
            keyable: false,
            channel_box: false,
            locked: false,
            storable: true,
            writable: true,
            connectable: true,
            enum_fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn short_name(mut self, name: impl Into<String>) -> Self {
        self.short_name = name.into();
        self
    }

    pub fn array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn min(mut self, v: f64) -> Self {
        self.min = Some(v);
        self
    }

    pub fn max(mut self, v: f64) -> Self {
        self.max = Some(v);
        self
    }

    pub fn soft_range(mut self, min: f64, max: f64) -> Self {
        self.soft_min = Some(min);
        self.soft_max = Some(max);
        self
    }

    pub fn keyable(mut self, keyable: bool) -> Self {
        self.keyable = keyable;
        self
    }

    pub fn channel_box(mut self, channel_box: bool) -> Self {
        self.channel_box = channel_box;
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn storable(mut self, storable: bool) -> Self {
        self.storable = storable;
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    pub fn enum_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn child(mut self, child: AttrSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = AttrSpec>) -> Self {
        self.children.extend(children);
        self
    }
}
