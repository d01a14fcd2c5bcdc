//! The struct bridge: adapts a host record format
//! to [`cel_values_core::StructBacking`].
//!
//! `ProtoStruct` wraps a `prost_reflect::DynamicMessage` — the same crate
//! Seq's `crates/runtime/serialize.rs` leans on for its own wire
//! encode/decode, so this reuses rather than introduces a dependency.
//! `MapStruct` is the schema-less fallback for hosts with no protobuf
//! descriptor at all, grounded the same way `cel-values-core::value::OwnedMap`
//! grounds the schema-less map backing.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use cel_values_core::{
    CelError, MapKey, Primitive, Qualifier, StructBacking, Type, TypeData, Value,
};
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind as ProtoKind};

/// Resolves a `google.protobuf.Any`'s carried type by URL. `struct_bridge`
/// sits below `reflect`'s `TypeReflector` in the dependency order, so it
/// can't call back into it directly; a schema authority hands one of these
/// in wherever it constructs a `ProtoStruct` that might contain an `Any`
/// field, nested arbitrarily deep.
pub trait AnyResolver: std::fmt::Debug + Send + Sync {
    fn resolve_any(&self, type_url: &str, bytes: &[u8]) -> Value;
}

/// A struct value backed by a protobuf `DynamicMessage`.
#[derive(Debug, Clone)]
pub struct ProtoStruct {
    message: DynamicMessage,
    any_resolver: Option<Arc<dyn AnyResolver>>,
}

impl ProtoStruct {
    pub fn new(message: DynamicMessage) -> ProtoStruct {
        ProtoStruct {
            message,
            any_resolver: None,
        }
    }

    /// Same as [`ProtoStruct::new`], but `Any`-typed fields (at any nesting
    /// depth under this struct) resolve through `resolver` instead of
    /// falling back to a raw struct value.
    pub fn with_any_resolver(message: DynamicMessage, resolver: Arc<dyn AnyResolver>) -> ProtoStruct {
        ProtoStruct {
            message,
            any_resolver: Some(resolver),
        }
    }

    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    fn field(&self, name: &str) -> Option<FieldDescriptor> {
        self.message.descriptor().get_field_by_name(name)
    }

    fn field_by_number(&self, number: i32) -> Option<FieldDescriptor> {
        self.message.descriptor().get_field(number as u32)
    }

    fn value_for(&self, field: &FieldDescriptor) -> Value {
        // Singular message fields (including wrapper types) have explicit
        // presence even in proto3: an unset one must read as `null`, not as
        // whatever zero-valued message `get_field` would hand back.
        if matches!(field.kind(), ProtoKind::Message(_))
            && !field.is_map()
            && !field.is_list()
            && !self.message.has_field(field)
        {
            return Value::Null;
        }
        let proto_value = self.message.get_field(field);
        proto_value_to_cel(&proto_value, field, self.any_resolver.as_ref())
    }
}

impl StructBacking for ProtoStruct {
    fn type_name(&self) -> &str {
        self.message.descriptor().full_name()
    }

    fn get_field_by_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        let field = self.field(name)?;
        Some(Cow::Owned(self.value_for(&field)))
    }

    fn get_field_by_number(&self, number: i32) -> Option<Cow<'_, Value>> {
        let field = self.field_by_number(number)?;
        Some(Cow::Owned(self.value_for(&field)))
    }

    fn has_field_by_name(&self, name: &str) -> bool {
        match self.field(name) {
            Some(field) => self.message.has_field(&field),
            None => false,
        }
    }

    fn has_field_by_number(&self, number: i32) -> bool {
        match self.field_by_number(number) {
            Some(field) => self.message.has_field(&field),
            None => false,
        }
    }

    fn field_names(&self) -> Vec<String> {
        self.message
            .descriptor()
            .fields()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// No native multi-step fast path for protobuf messages — each
    /// qualifier still costs one descriptor lookup, but there's nothing
    /// cheaper to batch across field boundaries (unlike, say, a flattened
    /// columnar backing).
    fn qualify(&self, qualifiers: &[Qualifier]) -> (Value, usize) {
        match qualifiers.first() {
            Some(Qualifier::Field(name)) => (self.struct_get(name), 1),
            _ => (
                Value::error(CelError::invalid_argument("no native qualify")),
                0,
            ),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl ProtoStruct {
    fn struct_get(&self, name: &str) -> Value {
        match self.get_field_by_name(name) {
            Some(v) => v.into_owned(),
            None => Value::error(CelError::not_found(format!("no such field: {name}"))),
        }
    }
}

/// Converts a declared protobuf field kind to its CEL [`Type`].
pub fn field_kind_to_type(field: &FieldDescriptor) -> Type {
    if field.is_map() {
        let entry = field.kind();
        if let ProtoKind::Message(entry_desc) = entry {
            let key_field = entry_desc.get_field(1);
            let value_field = entry_desc.get_field(2);
            let key_type = key_field
                .map(|f| field_kind_to_type(&f))
                .unwrap_or_else(Type::string);
            let value_type = value_field
                .map(|f| field_kind_to_type(&f))
                .unwrap_or_else(Type::dyn_);
            return Type::raw(TypeData::Map(key_type, value_type));
        }
    }
    let scalar = scalar_kind_to_type(&field.kind());
    if field.is_list() {
        Type::raw(TypeData::List(scalar))
    } else {
        scalar
    }
}

fn scalar_kind_to_type(kind: &ProtoKind) -> Type {
    match kind {
        ProtoKind::Double | ProtoKind::Float => Type::double(),
        ProtoKind::Int32 | ProtoKind::Sint32 | ProtoKind::Sfixed32 | ProtoKind::Int64
        | ProtoKind::Sint64 | ProtoKind::Sfixed64 => Type::int(),
        ProtoKind::Uint32 | ProtoKind::Fixed32 | ProtoKind::Uint64 | ProtoKind::Fixed64 => {
            Type::uint()
        }
        ProtoKind::Bool => Type::bool(),
        ProtoKind::String => Type::string(),
        ProtoKind::Bytes => Type::bytes(),
        ProtoKind::Enum(e) => Type::raw(TypeData::Enum(Arc::from(e.full_name()))),
        ProtoKind::Message(m) => well_known_or_struct_type(m.full_name()),
        ProtoKind::Group => Type::dyn_(),
    }
}

fn well_known_or_struct_type(full_name: &str) -> Type {
    match full_name {
        "google.protobuf.Duration" => Type::duration(),
        "google.protobuf.Timestamp" => Type::timestamp(),
        "google.protobuf.BoolValue" => Type::wrapper(Primitive::Bool),
        "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => Type::wrapper(Primitive::Int),
        "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
            Type::wrapper(Primitive::Uint)
        }
        "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
            Type::wrapper(Primitive::Double)
        }
        "google.protobuf.StringValue" => Type::wrapper(Primitive::String),
        "google.protobuf.BytesValue" => Type::wrapper(Primitive::Bytes),
        "google.protobuf.Any" => Type::any(),
        "google.protobuf.Value" | "google.protobuf.Struct" | "google.protobuf.ListValue" => {
            Type::dyn_()
        }
        other => Type::raw(TypeData::Struct(Arc::from(other))),
    }
}

/// Converts a `prost_reflect::Value` (already read out of a message) to its
/// CEL equivalent, given the field it came from (needed for map/enum/struct
/// disambiguation — `prost_reflect::Value` alone doesn't carry enough type
/// information).
pub fn proto_value_to_cel(
    value: &prost_reflect::Value,
    field: &FieldDescriptor,
    resolver: Option<&Arc<dyn AnyResolver>>,
) -> Value {
    use prost_reflect::Value as PV;
    if field.is_map() {
        if let PV::Map(entries) = value {
            let entry_kind = field.kind();
            let (key_field, value_field) = match &entry_kind {
                ProtoKind::Message(entry_desc) => (entry_desc.get_field(1), entry_desc.get_field(2)),
                _ => (None, None),
            };
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in entries {
                let key = proto_map_key_to_cel(k);
                let cel_value = match &value_field {
                    Some(vf) => proto_value_to_cel(v, vf, resolver),
                    None => Value::Null,
                };
                map.insert(key, cel_value);
            }
            let key_type = key_field
                .map(|f| field_kind_to_type(&f))
                .unwrap_or_else(Type::string);
            let value_type = value_field
                .map(|f| field_kind_to_type(&f))
                .unwrap_or_else(Type::dyn_);
            return Value::Map(Arc::new(cel_values_core::OwnedMap::new(
                key_type, value_type, map,
            )));
        }
    }
    if field.is_list() {
        if let PV::List(items) = value {
            let elements = items
                .iter()
                .map(|item| proto_scalar_to_cel(item, field, resolver))
                .collect();
            return Value::List(Arc::new(cel_values_core::OwnedList::new(
                field_kind_to_type(field)
                    .element_type()
                    .cloned()
                    .unwrap_or_else(Type::dyn_),
                elements,
            )));
        }
    }
    proto_scalar_to_cel(value, field, resolver)
}

fn proto_map_key_to_cel(key: &prost_reflect::MapKey) -> MapKey {
    use prost_reflect::MapKey as PK;
    match key {
        PK::Bool(b) => MapKey::Bool(*b),
        PK::I32(i) => MapKey::Int(*i as i64),
        PK::I64(i) => MapKey::Int(*i),
        PK::U32(u) => MapKey::Uint(*u as u64),
        PK::U64(u) => MapKey::Uint(*u),
        PK::String(s) => MapKey::String(Arc::from(s.as_str())),
    }
}

fn proto_scalar_to_cel(
    value: &prost_reflect::Value,
    field: &FieldDescriptor,
    resolver: Option<&Arc<dyn AnyResolver>>,
) -> Value {
    use prost_reflect::Value as PV;
    match value {
        PV::Bool(b) => Value::Bool(*b),
        PV::I32(i) => Value::Int(*i as i64),
        PV::I64(i) => Value::Int(*i),
        PV::U32(u) => Value::Uint(*u as u64),
        PV::U64(u) => Value::Uint(*u),
        PV::F32(f) => Value::Double(*f as f64),
        PV::F64(f) => Value::Double(*f),
        PV::String(s) => Value::string(s),
        PV::Bytes(b) => Value::bytes(b),
        PV::EnumNumber(n) => {
            let enum_type = match field.kind() {
                ProtoKind::Enum(e) => Type::raw(TypeData::Enum(Arc::from(e.full_name()))),
                _ => Type::dyn_(),
            };
            Value::Enum(cel_values_core::EnumValue {
                enum_type,
                number: *n,
            })
        }
        PV::Message(m) => message_value_to_cel(m, resolver),
        PV::Map(_) | PV::List(_) => {
            Value::error(CelError::internal("nested map/list handled by caller"))
        }
    }
}

pub(crate) fn message_value_to_cel(
    message: &DynamicMessage,
    resolver: Option<&Arc<dyn AnyResolver>>,
) -> Value {
    match message.descriptor().full_name() {
        "google.protobuf.Duration" => {
            let seconds = message
                .get_field_by_name("seconds")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let nanos = message
                .get_field_by_name("nanos")
                .and_then(|v| v.as_i32())
                .unwrap_or(0);
            match cel_values_core::Duration::new(seconds, nanos) {
                Ok(d) => Value::Duration(d),
                Err(e) => Value::error(e),
            }
        }
        "google.protobuf.Timestamp" => {
            let seconds = message
                .get_field_by_name("seconds")
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            let nanos = message
                .get_field_by_name("nanos")
                .and_then(|v| v.as_i32())
                .unwrap_or(0);
            match cel_values_core::Timestamp::new(seconds, nanos) {
                Ok(t) => Value::Timestamp(t),
                Err(e) => Value::error(e),
            }
        }
        "google.protobuf.BoolValue" | "google.protobuf.Int32Value" | "google.protobuf.Int64Value"
        | "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value"
        | "google.protobuf.FloatValue" | "google.protobuf.DoubleValue"
        | "google.protobuf.StringValue" | "google.protobuf.BytesValue" => {
            // Wrapper messages always carry a single `value` field. Presence
            // of the wrapper field itself is checked by `ProtoStruct::value_for`
            // before this function runs, so by the time we're here the wrapper
            // is known to be set.
            let descriptor = message.descriptor();
            match descriptor.get_field_by_name("value") {
                Some(field) => proto_scalar_to_cel(&message.get_field(&field), &field, resolver),
                None => Value::Null,
            }
        }
        "google.protobuf.Any" => {
            let type_url = message
                .get_field_by_name("type_url")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let bytes = message
                .get_field_by_name("value")
                .and_then(|v| v.as_bytes().map(|b| b.to_vec()))
                .unwrap_or_default();
            match resolver {
                Some(r) => r.resolve_any(&type_url, &bytes),
                None => Value::Struct(Arc::new(ProtoStruct::new(message.clone()))),
            }
        }
        _ => {
            let proto_struct = match resolver {
                Some(r) => ProtoStruct::with_any_resolver(message.clone(), Arc::clone(r)),
                None => ProtoStruct::new(message.clone()),
            };
            Value::Struct(Arc::new(proto_struct))
        }
    }
}

/// Converts a CEL value into a `prost_reflect::Value` for the given target
/// field, applying protobuf narrowing rules.
pub fn cel_value_to_proto(
    value: &Value,
    field: &FieldDescriptor,
) -> Result<prost_reflect::Value, CelError> {
    use prost_reflect::Value as PV;
    match (value, &field.kind()) {
        (Value::Bool(b), ProtoKind::Bool) => Ok(PV::Bool(*b)),
        (Value::Int(i), ProtoKind::Int64 | ProtoKind::Sint64 | ProtoKind::Sfixed64) => {
            Ok(PV::I64(*i))
        }
        (Value::Int(i), ProtoKind::Int32 | ProtoKind::Sint32 | ProtoKind::Sfixed32) => {
            i32::try_from(*i)
                .map(PV::I32)
                .map_err(|_| CelError::out_of_range(format!("{i} does not fit in int32")))
        }
        (Value::Uint(u), ProtoKind::Uint64 | ProtoKind::Fixed64) => Ok(PV::U64(*u)),
        (Value::Uint(u), ProtoKind::Uint32 | ProtoKind::Fixed32) => {
            u32::try_from(*u)
                .map(PV::U32)
                .map_err(|_| CelError::out_of_range(format!("{u} does not fit in uint32")))
        }
        (Value::Double(d), ProtoKind::Double) => Ok(PV::F64(*d)),
        (Value::Double(d), ProtoKind::Float) => Ok(PV::F32(*d as f32)),
        (Value::String(s), ProtoKind::String) => Ok(PV::String(s.to_string())),
        (Value::Bytes(b), ProtoKind::Bytes) => Ok(PV::Bytes(b.to_vec().into())),
        (Value::Enum(e), ProtoKind::Enum(_)) => Ok(PV::EnumNumber(e.number)),
        (other, _) => Err(CelError::invalid_argument(format!(
            "cannot assign {} to field {} of kind {:?}",
            other.kind(),
            field.name(),
            field.kind()
        ))),
    }
}

/// A schema-free struct backing over a plain name→value map — for hosts
/// with no protobuf descriptor at all (mirrors `cel_values_core::OwnedMap`'s
/// role for maps).
#[derive(Debug)]
pub struct MapStruct {
    type_name: Arc<str>,
    fields: HashMap<String, Value>,
}

impl MapStruct {
    pub fn new(type_name: impl Into<Arc<str>>, fields: HashMap<String, Value>) -> MapStruct {
        MapStruct {
            type_name: type_name.into(),
            fields,
        }
    }
}

impl StructBacking for MapStruct {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_field_by_name(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.fields.get(name).map(Cow::Borrowed)
    }

    fn get_field_by_number(&self, _number: i32) -> Option<Cow<'_, Value>> {
        None
    }

    fn has_field_by_name(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn has_field_by_number(&self, _number: i32) -> bool {
        false
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn qualify(&self, _qualifiers: &[Qualifier]) -> (Value, usize) {
        (
            Value::error(CelError::invalid_argument("no native qualify")),
            0,
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_struct_reports_declared_fields() {
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), Value::Int(1));
        let s = MapStruct::new("demo.Thing", fields);
        assert_eq!(s.type_name(), "demo.Thing");
        assert!(s.has_field_by_name("a"));
        assert!(!s.has_field_by_name("b"));
        assert_eq!(s.get_field_by_name("a").unwrap().into_owned(), Value::Int(1));
    }

    #[test]
    fn well_known_names_map_to_builtin_types() {
        assert_eq!(well_known_or_struct_type("google.protobuf.Duration"), Type::duration());
        assert_eq!(well_known_or_struct_type("google.protobuf.Timestamp"), Type::timestamp());
        assert_eq!(
            well_known_or_struct_type("google.protobuf.Int32Value"),
            Type::wrapper(Primitive::Int)
        );
    }
}
