//! List/map/struct builders.
//!
//! Grounded on Seq's incremental-construction pattern in
//! `crates/runtime/src/list_ops.rs` (`push`/`reserve`/materialize), adapted
//! from Seq's stack-value lists to typed CEL lists/maps/structs. The struct
//! builder additionally validates against a protobuf `MessageDescriptor`
//! when one is available (`StructBuilder::for_message`), or accepts any
//! field name for the schema-less case (`StructBuilder::schemaless`).

use std::collections::BTreeMap;
use std::sync::Arc;

use cel_values_core::{CelError, MapKey, OwnedList, OwnedMap, StructBacking, Type, Value};
use prost_reflect::{DynamicMessage, MessageDescriptor};

use crate::struct_bridge::{cel_value_to_proto, MapStruct, ProtoStruct};

/// Incrementally builds a `list<E>`.
pub struct ListBuilder {
    element_type: Type,
    items: Vec<Value>,
}

impl ListBuilder {
    pub fn new(element_type: Type) -> ListBuilder {
        ListBuilder {
            element_type,
            items: Vec::new(),
        }
    }

    pub fn add(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn build(self) -> Value {
        Value::List(Arc::new(OwnedList::new(self.element_type, self.items)))
    }
}

/// Incrementally builds a `map<K,V>`. Duplicate keys are
/// rejected rather than silently overwriting.
pub struct MapBuilder {
    key_type: Type,
    value_type: Type,
    entries: BTreeMap<MapKey, Value>,
}

impl MapBuilder {
    pub fn new(key_type: Type, value_type: Type) -> MapBuilder {
        MapBuilder {
            key_type,
            value_type,
            entries: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, key: Value, value: Value) -> Result<(), CelError> {
        let key = MapKey::from_value(&key)?;
        if self.entries.contains_key(&key) {
            return Err(CelError::invalid_argument(format!(
                "duplicate map key: {}",
                key.to_value().debug_string()
            )));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn build(self) -> Value {
        Value::Map(Arc::new(OwnedMap::new(
            self.key_type,
            self.value_type,
            self.entries,
        )))
    }
}

enum StructTarget {
    Proto(DynamicMessage),
    Schemaless {
        type_name: Arc<str>,
        fields: std::collections::HashMap<String, Value>,
    },
}

/// Incrementally builds a `struct` value. `set_field_by_name`/
/// `set_field_by_number` reject unknown fields (`not found`) or
/// type-mismatched/out-of-range values (`invalid argument`/`out of range`,
/// per the protobuf narrowing rules the struct bridge applies).
pub struct StructBuilder {
    target: StructTarget,
}

impl StructBuilder {
    pub fn for_message(descriptor: MessageDescriptor) -> StructBuilder {
        StructBuilder {
            target: StructTarget::Proto(DynamicMessage::new(descriptor)),
        }
    }

    pub fn schemaless(type_name: impl Into<Arc<str>>) -> StructBuilder {
        StructBuilder {
            target: StructTarget::Schemaless {
                type_name: type_name.into(),
                fields: std::collections::HashMap::new(),
            },
        }
    }

    pub fn set_field_by_name(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        match &mut self.target {
            StructTarget::Proto(message) => {
                let field = message
                    .descriptor()
                    .get_field_by_name(name)
                    .ok_or_else(|| CelError::not_found(format!("no such field: {name}")))?;
                let proto_value = cel_value_to_proto(&value, &field)?;
                message.set_field(&field, proto_value);
                Ok(())
            }
            StructTarget::Schemaless { fields, .. } => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    pub fn set_field_by_number(&mut self, number: i32, value: Value) -> Result<(), CelError> {
        match &mut self.target {
            StructTarget::Proto(message) => {
                let field = message
                    .descriptor()
                    .get_field(number as u32)
                    .ok_or_else(|| CelError::not_found(format!("no such field: #{number}")))?;
                let proto_value = cel_value_to_proto(&value, &field)?;
                message.set_field(&field, proto_value);
                Ok(())
            }
            StructTarget::Schemaless { .. } => Err(CelError::unimplemented(
                "schemaless structs have no field numbers",
            )),
        }
    }

    pub fn build(self) -> Value {
        match self.target {
            StructTarget::Proto(message) => Value::Struct(Arc::new(ProtoStruct::new(message))),
            StructTarget::Schemaless { type_name, fields } => {
                Value::Struct(Arc::new(MapStruct::new(type_name, fields)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_values_core::Type;

    #[test]
    fn list_builder_accumulates_in_order() {
        let mut builder = ListBuilder::new(Type::int());
        builder.add(Value::Int(1));
        builder.add(Value::Int(2));
        assert_eq!(builder.size(), 2);
        let list = builder.build();
        assert_eq!(list.list_get(1), Value::Int(2));
    }

    #[test]
    fn map_builder_rejects_duplicate_keys() {
        let mut builder = MapBuilder::new(Type::string(), Type::int());
        builder.put(Value::string("a"), Value::Int(1)).unwrap();
        let err = builder.put(Value::string("a"), Value::Int(2));
        assert!(err.is_err());
    }

    #[test]
    fn schemaless_struct_builder_round_trips() {
        let mut builder = StructBuilder::schemaless("demo.Thing");
        builder.set_field_by_name("a", Value::Int(1)).unwrap();
        let value = builder.build();
        assert_eq!(value.struct_get_field_by_name("a"), Value::Int(1));
    }
}
