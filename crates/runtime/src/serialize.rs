//! Serialization of CEL values.
//!
//! Grounded on Seq's own `serialize.rs`: same `TypedValue`-owned-
//! copy-for-serde shape and the same reasoning for `BTreeMap` over
//! `HashMap` (deterministic byte-for-byte output). The wire-format
//! operations (`serialize_to`/`serialized_size`, `convert_to_json`,
//! `convert_to_any`, and the free `deserialize` function) are new — Seq
//! has no protobuf-facing surface — and are grounded on `prost-types`' well-
//! known-type structs, which exist for exactly this purpose.
//! `serialize_to`/`serialized_size` produce the canonical wire form (the
//! protobuf encoding of the value's well-known wrapper type); every other
//! wire-facing conversion here builds on top of those bytes rather than
//! duplicating the per-kind match.
//!
//! `ValueSerialize` is an extension trait, not inherent `Value` methods,
//! because `cel_values_core::Value` cannot depend on `prost` (see
//! `crates/core/src/value.rs`'s module docs) — this is legal under Rust's
//! orphan rules since the trait itself is local to this crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use cel_values_core::debug::{format_duration, format_timestamp};
use cel_values_core::{ErrorCode, Kind, MapKey as RuntimeMapKey, StructBacking, Value};
use prost::Message;
use prost_types::{value::Kind as JsonKind, Any, ListValue, Struct as ProtoStructMsg};
use serde::{Deserialize, Serialize};

/// Errors specific to serialization (as opposed to ordinary evaluation
/// errors, which surface as `CelError`/`Value::Error`).
#[derive(Debug)]
pub enum SerializeError {
    /// `error`/`unknown` carry no user-addressable representation to freeze
    /// — attempting to serialize one is a caller bug, not a
    /// runtime condition.
    ControlValueNotSerializable(Kind),
    /// Opaque values are host-defined; without a host-registered codec
    /// there is nothing generic to serialize.
    OpaqueNotSerializable(String),
    BincodeError(Box<bincode::Error>),
    InvalidData(String),
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializeError::ControlValueNotSerializable(kind) => {
                write!(f, "{kind} values have no serializable representation")
            }
            SerializeError::OpaqueNotSerializable(name) => {
                write!(f, "opaque type {name} has no registered serialization codec")
            }
            SerializeError::BincodeError(e) => write!(f, "bincode error: {e}"),
            SerializeError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for SerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializeError::BincodeError(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<bincode::Error> for SerializeError {
    fn from(e: bincode::Error) -> Self {
        SerializeError::BincodeError(Box::new(e))
    }
}

impl From<SerializeError> for cel_values_core::CelError {
    fn from(e: SerializeError) -> cel_values_core::CelError {
        cel_values_core::CelError::internal(e.to_string())
    }
}

/// An owned, serde-friendly mirror of [`Value`] for persistence (event
/// sourcing snapshots, IPC) — `Value`'s `Handle<T>`/`Arc<dyn Trait>`
/// payloads aren't directly serializable, same reasoning as Seq's
/// `TypedValue` over its own arena-backed `Value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Duration { seconds: i64, nanos: i32 },
    Timestamp { seconds: i64, nanos: i32 },
    List(Vec<TypedValue>),
    Map(BTreeMap<TypedMapKey, TypedValue>),
}

/// Subset of [`TypedValue`] usable as a map key, mirroring
/// `cel_values_core::MapKey` with an owned string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypedMapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

impl TypedMapKey {
    pub fn from_runtime(key: &RuntimeMapKey) -> TypedMapKey {
        match key {
            RuntimeMapKey::Bool(b) => TypedMapKey::Bool(*b),
            RuntimeMapKey::Int(i) => TypedMapKey::Int(*i),
            RuntimeMapKey::Uint(u) => TypedMapKey::Uint(*u),
            RuntimeMapKey::String(s) => TypedMapKey::String(s.to_string()),
        }
    }

    pub fn to_runtime(&self) -> RuntimeMapKey {
        match self {
            TypedMapKey::Bool(b) => RuntimeMapKey::Bool(*b),
            TypedMapKey::Int(i) => RuntimeMapKey::Int(*i),
            TypedMapKey::Uint(u) => RuntimeMapKey::Uint(*u),
            TypedMapKey::String(s) => RuntimeMapKey::String(Arc::from(s.as_str())),
        }
    }
}

impl TypedValue {
    /// `struct`/`type`/`enum`/`opaque` have no host-independent owned form
    /// and are therefore not covered by this persistence format — only the
    /// structural scalar/container shapes are. Non-finite
    /// doubles are rejected here (not just left to serde) since round-
    /// tripping NaN/Infinity through a persisted snapshot is a common source
    /// of silent divergence between the value before and after a restore.
    pub fn from_value(value: &Value) -> Result<TypedValue, SerializeError> {
        match value {
            Value::Null => Ok(TypedValue::Null),
            Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            Value::Int(i) => Ok(TypedValue::Int(*i)),
            Value::Uint(u) => Ok(TypedValue::Uint(*u)),
            Value::Double(d) => {
                if d.is_finite() {
                    Ok(TypedValue::Double(*d))
                } else {
                    Err(SerializeError::InvalidData(format!(
                        "non-finite double {d} cannot be persisted"
                    )))
                }
            }
            Value::Bytes(b) => Ok(TypedValue::Bytes(b.to_vec())),
            Value::String(s) => Ok(TypedValue::String(s.to_string())),
            Value::Duration(d) => Ok(TypedValue::Duration {
                seconds: d.seconds,
                nanos: d.nanos,
            }),
            Value::Timestamp(t) => Ok(TypedValue::Timestamp {
                seconds: t.seconds,
                nanos: t.nanos,
            }),
            Value::List(l) => {
                let mut items = Vec::with_capacity(l.len());
                for i in 0..l.len() {
                    let Some(item) = l.get(i) else { continue };
                    items.push(TypedValue::from_value(&item)?);
                }
                Ok(TypedValue::List(items))
            }
            Value::Map(m) => {
                let mut entries = BTreeMap::new();
                for key in m.keys() {
                    let Some(v) = m.find(&key) else { continue };
                    entries.insert(TypedMapKey::from_runtime(&key), TypedValue::from_value(&v)?);
                }
                Ok(TypedValue::Map(entries))
            }
            Value::Opaque(o) => Err(SerializeError::OpaqueNotSerializable(
                o.type_name().to_string(),
            )),
            Value::Error(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Error)),
            Value::Unknown(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Unknown)),
            other => Err(SerializeError::InvalidData(format!(
                "{} has no persistence representation",
                other.kind()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::Int(i) => Value::Int(*i),
            TypedValue::Uint(u) => Value::Uint(*u),
            TypedValue::Double(d) => Value::Double(*d),
            TypedValue::Bytes(b) => Value::bytes(b),
            TypedValue::String(s) => Value::string(s),
            TypedValue::Duration { seconds, nanos } => {
                Value::Duration(cel_values_core::Duration {
                    seconds: *seconds,
                    nanos: *nanos,
                })
            }
            TypedValue::Timestamp { seconds, nanos } => {
                Value::Timestamp(cel_values_core::Timestamp {
                    seconds: *seconds,
                    nanos: *nanos,
                })
            }
            TypedValue::List(items) => Value::List(Arc::new(cel_values_core::OwnedList::new(
                cel_values_core::Type::dyn_(),
                items.iter().map(TypedValue::to_value).collect(),
            ))),
            TypedValue::Map(entries) => Value::Map(Arc::new(cel_values_core::OwnedMap::new(
                cel_values_core::Type::dyn_(),
                cel_values_core::Type::dyn_(),
                entries
                    .iter()
                    .map(|(k, v)| (k.to_runtime(), v.to_value()))
                    .collect(),
            ))),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        bincode::serialize(self).map_err(SerializeError::from)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<TypedValue, SerializeError> {
        bincode::deserialize(bytes).map_err(SerializeError::from)
    }
}

/// Extension methods bridging [`Value`] to the protobuf/JSON wire world
///.
pub trait ValueSerialize {
    /// Appends the canonical wire form (the protobuf encoding of the
    /// value's well-known wrapper type — see module docs) to `out`. The
    /// base operation every other serialization method here builds on.
    fn serialize_to(&self, out: &mut Vec<u8>) -> Result<(), SerializeError>;

    /// Byte length of `serialize_to`'s output, without requiring the
    /// caller to allocate a buffer first.
    fn serialized_size(&self) -> Result<usize, SerializeError>;

    /// Convert to the owned, serializable [`TypedValue`] snapshot form.
    fn to_typed(&self) -> Result<TypedValue, SerializeError>;

    /// Serialize directly to bincode bytes.
    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError>;

    /// CEL-JSON conversion: the canonical mapping used by
    /// conformance harnesses and debugging tools, distinct from
    /// `debug_string()`'s human-oriented text.
    fn convert_to_json(&self) -> Result<serde_json::Value, SerializeError>;

    /// Wraps `serialize_to`'s bytes in a `google.protobuf.Any`, tagged with
    /// the type URL for the value's well-known wrapper type.
    fn convert_to_any(&self) -> Result<Any, SerializeError>;
}

impl ValueSerialize for Value {
    fn serialize_to(&self, out: &mut Vec<u8>) -> Result<(), SerializeError> {
        out.extend_from_slice(&value_to_wire_bytes(self)?);
        Ok(())
    }

    fn serialized_size(&self) -> Result<usize, SerializeError> {
        Ok(value_to_wire_bytes(self)?.len())
    }

    fn to_typed(&self) -> Result<TypedValue, SerializeError> {
        TypedValue::from_value(self)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        TypedValue::from_value(self)?.to_bytes()
    }

    fn convert_to_json(&self) -> Result<serde_json::Value, SerializeError> {
        value_to_json(self)
    }

    fn convert_to_any(&self) -> Result<Any, SerializeError> {
        value_to_any(self)
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, SerializeError> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        // JSON numbers are IEEE 754 doubles and cannot exactly represent
        // the full i64/u64 range; CEL-JSON falls back to a decimal string
        // whenever the value doesn't survive an f64 round trip.
        Value::Int(i) => Ok(int_to_json(*i)),
        Value::Uint(u) => Ok(uint_to_json(*u)),
        Value::Double(d) => {
            if d.is_nan() {
                Ok(serde_json::Value::String("NaN".to_string()))
            } else if d.is_infinite() {
                let s = if d.is_sign_positive() { "Infinity" } else { "-Infinity" };
                Ok(serde_json::Value::String(s.to_string()))
            } else {
                serde_json::Number::from_f64(*d)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| SerializeError::InvalidData(format!("cannot encode {d} as JSON")))
            }
        }
        Value::Bytes(b) => Ok(serde_json::Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b.as_ref(),
        ))),
        Value::String(s) => Ok(serde_json::Value::String(s.to_string())),
        Value::Duration(d) => Ok(serde_json::Value::String(format_duration(d.seconds, d.nanos))),
        Value::Timestamp(t) => Ok(serde_json::Value::String(format_timestamp(
            t.seconds, t.nanos,
        ))),
        Value::List(l) => {
            let mut items = Vec::with_capacity(l.len());
            for i in 0..l.len() {
                let Some(item) = l.get(i) else { continue };
                items.push(value_to_json(&item)?);
            }
            Ok(serde_json::Value::Array(items))
        }
        Value::Map(m) => {
            let mut object = serde_json::Map::new();
            for key in m.keys() {
                let Some(v) = m.find(&key) else { continue };
                object.insert(map_key_string(&key), value_to_json(&v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
        Value::Struct(s) => {
            let mut object = serde_json::Map::new();
            for name in s.field_names() {
                let Some(v) = s.get_field_by_name(&name) else { continue };
                object.insert(name, value_to_json(&v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
        Value::Optional(o) => match o.value() {
            Some(v) => value_to_json(v),
            None => Ok(serde_json::Value::Null),
        },
        Value::Enum(e) => Ok(serde_json::Value::Number(e.number.into())),
        Value::Type(t) => Ok(serde_json::Value::String(t.name())),
        Value::Opaque(o) => Err(SerializeError::OpaqueNotSerializable(
            o.type_name().to_string(),
        )),
        Value::Error(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Error)),
        Value::Unknown(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Unknown)),
    }
}

fn map_key_string(key: &RuntimeMapKey) -> String {
    match key {
        RuntimeMapKey::String(s) => s.to_string(),
        RuntimeMapKey::Bool(b) => b.to_string(),
        RuntimeMapKey::Int(i) => i.to_string(),
        RuntimeMapKey::Uint(u) => u.to_string(),
    }
}

fn int_to_json(i: i64) -> serde_json::Value {
    if (i as f64) as i64 == i {
        serde_json::Value::Number(i.into())
    } else {
        serde_json::Value::String(i.to_string())
    }
}

fn uint_to_json(u: u64) -> serde_json::Value {
    const MAX_EXACT: u64 = 1 << 53;
    if u <= MAX_EXACT {
        serde_json::Value::Number(u.into())
    } else {
        serde_json::Value::String(u.to_string())
    }
}

/// The bare type name (no `type.googleapis.com/` prefix) of the canonical
/// well-known type `value`'s wire form encodes as. `enum`'s canonical form
/// is its numeric value (spec.md's value model table), so it shares
/// `Int32Value` with no dedicated wrapper of its own.
fn canonical_type_name(value: &Value) -> Result<String, SerializeError> {
    match value {
        Value::Bool(_) => Ok("google.protobuf.BoolValue".to_string()),
        Value::Int(_) => Ok("google.protobuf.Int64Value".to_string()),
        Value::Uint(_) => Ok("google.protobuf.UInt64Value".to_string()),
        Value::Double(_) => Ok("google.protobuf.DoubleValue".to_string()),
        Value::String(_) => Ok("google.protobuf.StringValue".to_string()),
        Value::Bytes(_) => Ok("google.protobuf.BytesValue".to_string()),
        Value::Duration(_) => Ok("google.protobuf.Duration".to_string()),
        Value::Timestamp(_) => Ok("google.protobuf.Timestamp".to_string()),
        Value::Null => Ok("google.protobuf.Value".to_string()),
        Value::Enum(_) => Ok("google.protobuf.Int32Value".to_string()),
        Value::List(_) => Ok("google.protobuf.ListValue".to_string()),
        Value::Map(_) => Ok("google.protobuf.Struct".to_string()),
        Value::Struct(s) => match s.as_any().downcast_ref::<crate::struct_bridge::ProtoStruct>() {
            Some(proto) => Ok(proto.message().descriptor().full_name().to_string()),
            None => Err(SerializeError::OpaqueNotSerializable(
                s.type_name().to_string(),
            )),
        },
        Value::Error(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Error)),
        Value::Unknown(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Unknown)),
        Value::Opaque(o) => Err(SerializeError::OpaqueNotSerializable(
            o.type_name().to_string(),
        )),
        Value::Type(_) | Value::Optional(_) => Err(SerializeError::InvalidData(format!(
            "{} has no canonical wire form",
            value.kind()
        ))),
    }
}

/// The canonical wire-form bytes: the protobuf encoding of whatever message
/// `canonical_type_name` names. Shared by `serialize_to`/`serialized_size`
/// and `convert_to_any`, which tags these same bytes with a type URL.
fn value_to_wire_bytes(value: &Value) -> Result<Vec<u8>, SerializeError> {
    match value {
        Value::Bool(b) => Ok(prost_types::BoolValue { value: *b }.encode_to_vec()),
        Value::Int(i) => Ok(prost_types::Int64Value { value: *i }.encode_to_vec()),
        Value::Uint(u) => Ok(prost_types::UInt64Value { value: *u }.encode_to_vec()),
        Value::Double(d) => Ok(prost_types::DoubleValue { value: *d }.encode_to_vec()),
        Value::String(s) => Ok(prost_types::StringValue {
            value: s.to_string(),
        }
        .encode_to_vec()),
        Value::Bytes(b) => Ok(prost_types::BytesValue { value: b.to_vec() }.encode_to_vec()),
        Value::Duration(d) => Ok(prost_types::Duration {
            seconds: d.seconds,
            nanos: d.nanos,
        }
        .encode_to_vec()),
        Value::Timestamp(t) => Ok(prost_types::Timestamp {
            seconds: t.seconds,
            nanos: t.nanos,
        }
        .encode_to_vec()),
        Value::Null => Ok(prost_types::Value {
            kind: Some(JsonKind::NullValue(0)),
        }
        .encode_to_vec()),
        Value::Enum(e) => Ok(prost_types::Int32Value { value: e.number }.encode_to_vec()),
        Value::List(l) => {
            let mut values = Vec::with_capacity(l.len());
            for i in 0..l.len() {
                let Some(item) = l.get(i) else { continue };
                values.push(value_to_proto_json_value(&item)?);
            }
            Ok(ListValue { values }.encode_to_vec())
        }
        Value::Map(m) => {
            let mut fields = BTreeMap::new();
            for key in m.keys() {
                let Some(v) = m.find(&key) else { continue };
                fields.insert(map_key_string(&key), value_to_proto_json_value(&v)?);
            }
            Ok(ProtoStructMsg {
                fields: fields.into_iter().collect(),
            }
            .encode_to_vec())
        }
        Value::Struct(s) => match s.as_any().downcast_ref::<crate::struct_bridge::ProtoStruct>() {
            Some(proto) => Ok(proto.message().encode_to_vec()),
            None => Err(SerializeError::OpaqueNotSerializable(
                s.type_name().to_string(),
            )),
        },
        Value::Error(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Error)),
        Value::Unknown(_) => Err(SerializeError::ControlValueNotSerializable(Kind::Unknown)),
        Value::Opaque(o) => Err(SerializeError::OpaqueNotSerializable(
            o.type_name().to_string(),
        )),
        Value::Type(_) | Value::Optional(_) => Err(SerializeError::InvalidData(format!(
            "{} has no canonical wire form",
            value.kind()
        ))),
    }
}

fn value_to_any(value: &Value) -> Result<Any, SerializeError> {
    let type_url = format!("type.googleapis.com/{}", canonical_type_name(value)?);
    let value = value_to_wire_bytes(value)?;
    Ok(Any { type_url, value })
}

/// Inverse of [`value_to_wire_bytes`] for the closed kinds: given the
/// target `Type` and the bytes `serialize_to` produced for a value of that
/// type, reconstructs the value. `struct` has no case here — rebuilding one
/// needs a schema authority to know its field layout, which is what
/// [`crate::reflect::TypeReflector::deserialize_any`] is for.
pub fn deserialize(type_: &cel_values_core::Type, bytes: &[u8]) -> Result<Value, SerializeError> {
    match type_.kind() {
        Kind::Bool => decode::<prost_types::BoolValue>(bytes).map(|m| Value::Bool(m.value)),
        Kind::Int => decode::<prost_types::Int64Value>(bytes).map(|m| Value::Int(m.value)),
        Kind::Uint => decode::<prost_types::UInt64Value>(bytes).map(|m| Value::Uint(m.value)),
        Kind::Double => decode::<prost_types::DoubleValue>(bytes).map(|m| Value::Double(m.value)),
        Kind::String => decode::<prost_types::StringValue>(bytes).map(|m| Value::string(&m.value)),
        Kind::Bytes => decode::<prost_types::BytesValue>(bytes).map(|m| Value::bytes(&m.value)),
        Kind::Duration => {
            let m = decode::<prost_types::Duration>(bytes)?;
            cel_values_core::Duration::new(m.seconds, m.nanos)
                .map(Value::Duration)
                .map_err(|e| SerializeError::InvalidData(e.to_string()))
        }
        Kind::Timestamp => {
            let m = decode::<prost_types::Timestamp>(bytes)?;
            cel_values_core::Timestamp::new(m.seconds, m.nanos)
                .map(Value::Timestamp)
                .map_err(|e| SerializeError::InvalidData(e.to_string()))
        }
        Kind::Enum => {
            let m = decode::<prost_types::Int32Value>(bytes)?;
            Ok(Value::Enum(cel_values_core::EnumValue {
                enum_type: type_.clone(),
                number: m.value,
            }))
        }
        Kind::List => {
            let m = decode::<ListValue>(bytes)?;
            let element_type = type_
                .element_type()
                .cloned()
                .unwrap_or_else(cel_values_core::Type::dyn_);
            let mut elements = Vec::with_capacity(m.values.len());
            for v in &m.values {
                elements.push(proto_json_value_to_value(v)?);
            }
            Ok(Value::List(Arc::new(cel_values_core::OwnedList::new(
                element_type,
                elements,
            ))))
        }
        Kind::Map => {
            let m = decode::<ProtoStructMsg>(bytes)?;
            let key_type = type_
                .key_type()
                .cloned()
                .unwrap_or_else(cel_values_core::Type::string);
            let value_type = type_
                .value_type()
                .cloned()
                .unwrap_or_else(cel_values_core::Type::dyn_);
            let mut entries = BTreeMap::new();
            for (k, v) in &m.fields {
                entries.insert(
                    RuntimeMapKey::String(Arc::from(k.as_str())),
                    proto_json_value_to_value(v)?,
                );
            }
            Ok(Value::Map(Arc::new(cel_values_core::OwnedMap::new(
                key_type, value_type, entries,
            ))))
        }
        Kind::Struct => Err(SerializeError::InvalidData(
            "struct deserialization needs a schema authority; use TypeReflector::deserialize_any"
                .to_string(),
        )),
        other => Err(SerializeError::InvalidData(format!(
            "{other} has no canonical wire deserialization"
        ))),
    }
}

fn decode<M: prost::Message + Default>(bytes: &[u8]) -> Result<M, SerializeError> {
    M::decode(bytes).map_err(|e| SerializeError::InvalidData(e.to_string()))
}

fn proto_json_value_to_value(value: &prost_types::Value) -> Result<Value, SerializeError> {
    match &value.kind {
        Some(JsonKind::NullValue(_)) | None => Ok(Value::Null),
        Some(JsonKind::BoolValue(b)) => Ok(Value::Bool(*b)),
        Some(JsonKind::NumberValue(n)) => Ok(Value::Double(*n)),
        Some(JsonKind::StringValue(s)) => Ok(Value::string(s)),
        Some(JsonKind::ListValue(l)) => {
            let mut elements = Vec::with_capacity(l.values.len());
            for v in &l.values {
                elements.push(proto_json_value_to_value(v)?);
            }
            Ok(Value::List(Arc::new(cel_values_core::OwnedList::new(
                cel_values_core::Type::dyn_(),
                elements,
            ))))
        }
        Some(JsonKind::StructValue(s)) => {
            let mut entries = BTreeMap::new();
            for (k, v) in &s.fields {
                entries.insert(
                    RuntimeMapKey::String(Arc::from(k.as_str())),
                    proto_json_value_to_value(v)?,
                );
            }
            Ok(Value::Map(Arc::new(cel_values_core::OwnedMap::new(
                cel_values_core::Type::string(),
                cel_values_core::Type::dyn_(),
                entries,
            ))))
        }
    }
}

fn value_to_proto_json_value(value: &Value) -> Result<prost_types::Value, SerializeError> {
    let kind = match value {
        Value::Null => JsonKind::NullValue(0),
        Value::Bool(b) => JsonKind::BoolValue(*b),
        Value::Int(i) => JsonKind::NumberValue(*i as f64),
        Value::Uint(u) => JsonKind::NumberValue(*u as f64),
        Value::Double(d) => JsonKind::NumberValue(*d),
        Value::String(s) => JsonKind::StringValue(s.to_string()),
        Value::List(l) => {
            let mut values = Vec::with_capacity(l.len());
            for i in 0..l.len() {
                let Some(item) = l.get(i) else { continue };
                values.push(value_to_proto_json_value(&item)?);
            }
            JsonKind::ListValue(ListValue { values })
        }
        Value::Map(m) => {
            let mut fields = BTreeMap::new();
            for key in m.keys() {
                let Some(v) = m.find(&key) else { continue };
                fields.insert(map_key_string(&key), value_to_proto_json_value(&v)?);
            }
            JsonKind::StructValue(ProtoStructMsg {
                fields: fields.into_iter().collect(),
            })
        }
        other => {
            return Err(SerializeError::InvalidData(format!(
                "{} cannot appear inside a google.protobuf.Value tree",
                other.kind()
            )))
        }
    };
    Ok(prost_types::Value { kind: Some(kind) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_values_core::{CelError, OwnedList, OwnedMap, Type};

    #[test]
    fn typed_value_round_trips_scalars() {
        let value = Value::Int(42);
        let typed = TypedValue::from_value(&value).unwrap();
        assert_eq!(typed.to_value(), value);
        let bytes = typed.to_bytes().unwrap();
        assert_eq!(TypedValue::from_bytes(&bytes).unwrap(), typed);
    }

    #[test]
    fn typed_value_rejects_error_and_nan() {
        assert!(
            TypedValue::from_value(&Value::error(CelError::new(ErrorCode::Internal, "boom")))
                .is_err()
        );
        assert!(TypedValue::from_value(&Value::Double(f64::NAN)).is_err());
    }

    #[test]
    fn json_conversion_of_container_values() {
        let list = Value::List(Arc::new(OwnedList::new(
            Type::int(),
            vec![Value::Int(1), Value::Int(2)],
        )));
        assert_eq!(list.convert_to_json().unwrap(), serde_json::json!([1, 2]));
        let map = Value::Map(Arc::new(OwnedMap::new(
            Type::string(),
            Type::int(),
            [(RuntimeMapKey::String(Arc::from("a")), Value::Int(1))]
                .into_iter()
                .collect(),
        )));
        assert_eq!(map.convert_to_json().unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn any_conversion_uses_well_known_wrapper() {
        let any = Value::Int(7).convert_to_any().unwrap();
        assert_eq!(
            any.type_url,
            "type.googleapis.com/google.protobuf.Int64Value"
        );
    }

    #[test]
    fn json_conversion_rejects_control_values() {
        let err = Value::error(CelError::internal("boom")).convert_to_json();
        assert!(err.is_err());
    }

    #[test]
    fn corrupted_bytes_do_not_deserialize() {
        assert!(TypedValue::from_bytes(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn json_conversion_of_non_finite_doubles() {
        assert_eq!(
            Value::Double(f64::NAN).convert_to_json().unwrap(),
            serde_json::json!("NaN")
        );
        assert_eq!(
            Value::Double(f64::INFINITY).convert_to_json().unwrap(),
            serde_json::json!("Infinity")
        );
        assert_eq!(
            Value::Double(f64::NEG_INFINITY).convert_to_json().unwrap(),
            serde_json::json!("-Infinity")
        );
    }

    fn round_trip(value: Value, ty: Type) {
        let mut bytes = Vec::new();
        value.serialize_to(&mut bytes).unwrap();
        assert_eq!(value.serialized_size().unwrap(), bytes.len());
        assert_eq!(super::deserialize(&ty, &bytes).unwrap(), value);
    }

    #[test]
    fn round_trips_primitives() {
        round_trip(Value::Bool(true), Type::bool());
        round_trip(Value::Int(-7), Type::int());
        round_trip(Value::Uint(7), Type::uint());
        round_trip(Value::Double(1.5), Type::double());
        round_trip(Value::string("héllo"), Type::string());
        round_trip(Value::bytes(b"\x00\x01\x02"), Type::bytes());
    }

    #[test]
    fn round_trips_duration_and_timestamp() {
        round_trip(
            Value::Duration(cel_values_core::Duration::new(5, 0).unwrap()),
            Type::duration(),
        );
        round_trip(
            Value::Timestamp(cel_values_core::Timestamp::new(1_700_000_000, 0).unwrap()),
            Type::timestamp(),
        );
    }

    #[test]
    fn round_trips_enum_by_numeric_value() {
        let factory = crate::factory::TypeFactory::new();
        let enum_type = factory.enum_type("demo.Color");
        let value = Value::Enum(cel_values_core::EnumValue {
            enum_type: enum_type.clone(),
            number: 2,
        });
        round_trip(value, enum_type);
    }

    #[test]
    fn round_trips_list_and_map_of_primitives() {
        let list = Value::List(Arc::new(OwnedList::new(
            Type::int(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        )));
        let factory = crate::factory::TypeFactory::new();
        round_trip(list, factory.list(Type::int()));

        let map = Value::Map(Arc::new(OwnedMap::new(
            Type::string(),
            Type::int(),
            [(RuntimeMapKey::String(Arc::from("a")), Value::Int(1))]
                .into_iter()
                .collect(),
        )));
        round_trip(map, factory.map(Type::string(), Type::int()));
    }

    #[test]
    fn deserialize_rejects_struct_without_a_schema_authority() {
        let factory = crate::factory::TypeFactory::new();
        let struct_type = factory.struct_type("demo.Thing");
        assert!(super::deserialize(&struct_type, &[]).is_err());
    }
}
