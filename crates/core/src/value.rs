//! The Value model.
//!
//! Directly grounded on Seq's `Value` enum
//! (`crates/runtime/src/value.rs`): a single `#[derive(Clone)]` discriminated
//! union, one variant per kind, with heap-shaped payloads behind `Handle`
//! (the `SeqString` duality, generalized) for the two kinds that plausibly
//! appear at bulk scale — `string` and `bytes` — and plain `Arc` for
//! container/struct/opaque/error/unknown payloads. Seq never dual-
//! allocates anything but strings either; widening the pooling discipline to
//! every payload kind would add real complexity (bump-allocating a `dyn
//! Trait` requires a concrete sized type at the allocation site and a manual
//! unsizing step) for a case no caller needs, so those payloads are always
//! reference-counted. Recorded as an Open Question resolution in
//! `DESIGN.md`.
//!
//! `serialize_to`/`convert_to_json`/`convert_to_any` are *not*
//! inherent methods here — they need the protobuf wire-format stack, which
//! would pull `prost` into this crate. They are implemented as an extension
//! trait over this `Value` in `cel_values_runtime::serialize`, exactly the
//! shape of Seq's `ValueSerialize` trait over its own `Value`
//! (`crates/runtime/src/serialize.rs`).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::debug;
use crate::error::CelError;
use crate::kind::Kind;
use crate::memory::Handle;
use crate::numeric::{self, Numeric};
use crate::types::Type;
use crate::unknown::Unknown;

/// A nanosecond-resolution signed interval, bounded ±10000 years. Stored as `(seconds, nanos)` rather than a single
/// nanosecond count: 10000 years of nanoseconds overflows `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

/// An absolute instant relative to the Unix epoch, same bound and shape as
/// [`Duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// ±10000 Julian years in seconds — the shared bound for [`Duration`] and
/// [`Timestamp`].
pub const MAX_SECONDS: i64 = 315_576_000_000;
pub const MIN_SECONDS: i64 = -315_576_000_000;

impl Duration {
    pub fn new(seconds: i64, nanos: i32) -> Result<Duration, CelError> {
        check_bounds(seconds, nanos)?;
        Ok(Duration { seconds, nanos })
    }

    pub fn from_seconds(seconds: i64) -> Result<Duration, CelError> {
        Duration::new(seconds, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Result<Timestamp, CelError> {
        check_bounds(seconds, nanos)?;
        Ok(Timestamp { seconds, nanos })
    }

    pub fn epoch() -> Timestamp {
        Timestamp {
            seconds: 0,
            nanos: 0,
        }
    }

    pub fn is_epoch(&self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }
}

fn check_bounds(seconds: i64, nanos: i32) -> Result<(), CelError> {
    if seconds > MAX_SECONDS
        || seconds < MIN_SECONDS
        || (seconds == MAX_SECONDS && nanos > 0)
        || (seconds == MIN_SECONDS && nanos < 0)
    {
        return Err(CelError::out_of_range(format!(
            "seconds={seconds} nanos={nanos} outside ±{MAX_SECONDS}s"
        )));
    }
    Ok(())
}

/// A map key: key kinds are restricted to {bool, int, uint, string}. `String` is a plain `Arc<str>`, not `Handle<str>` — map keys must
/// be `Eq + Hash` by content for native `HashMap`/`BTreeMap` backings, which
/// `Handle` does not provide uniformly across its two variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(Arc<str>),
}

impl MapKey {
    /// `Err(invalid argument)` for any kind outside {bool, int, uint,
    /// string} — this includes every `double`, since `double` is not an
    /// allowed map-key type at all, not only when it happens to be NaN
    ///.
    pub fn from_value(value: &Value) -> Result<MapKey, CelError> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Uint(u) => Ok(MapKey::Uint(*u)),
            Value::String(s) => Ok(MapKey::String(Arc::from(&**s))),
            other => Err(CelError::invalid_argument(format!(
                "invalid map key kind: {}",
                other.kind()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Uint(u) => Value::Uint(*u),
            MapKey::String(s) => Value::string(s),
        }
    }
}

/// One step in a `struct.qualify` chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    Field(Arc<str>),
    Index(i64),
    Key(MapKey),
}

/// The native-or-foreign backing of a `list` value. Implementors must be
/// `Send + Sync`: the activation/evaluator may hand a value across threads
/// between (never during) evaluations.
pub trait ListBacking: fmt::Debug + Send + Sync {
    fn element_type(&self) -> &Type;
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<Cow<'_, Value>>;
}

/// The native-or-foreign backing of a `map` value.
pub trait MapBacking: fmt::Debug + Send + Sync {
    fn key_type(&self) -> &Type;
    fn value_type(&self) -> &Type;
    fn len(&self) -> usize;
    fn find(&self, key: &MapKey) -> Option<Cow<'_, Value>>;
    /// Order is unspecified but stable within this backing's lifetime
    ///.
    fn keys(&self) -> Vec<MapKey>;
}

/// The native-or-foreign backing of a `struct` value (the struct bridge
/// implements this for protobuf messages in the runtime crate).
pub trait StructBacking: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;
    /// `None` means the field is not declared by the schema at all (the
    /// `get_field_by_name` wrapper turns that into a "not found" error);
    /// `Some(Value::Null)` means declared-but-unset on a presence-bearing
    /// message.
    fn get_field_by_name(&self, name: &str) -> Option<Cow<'_, Value>>;
    fn get_field_by_number(&self, number: i32) -> Option<Cow<'_, Value>>;
    fn has_field_by_name(&self, name: &str) -> bool;
    fn has_field_by_number(&self, number: i32) -> bool;
    /// Schema-declared order.
    fn field_names(&self) -> Vec<String>;
    /// Consume as large a prefix of `qualifiers` as this backing can
    /// traverse natively; returns the resulting value and how many
    /// qualifiers were consumed. A backing with no fast path returns
    /// `(Value::Error(invalid argument-shaped "no native qualify"), 0)` —
    /// callers fall back to repeated `get_field_by_*`.
    fn qualify(&self, qualifiers: &[Qualifier]) -> (Value, usize);
    /// Lets callers outside this crate recover the concrete backing type
    /// (the struct bridge's protobuf adapter, to re-encode a message instead
    /// of rebuilding one field at a time).
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A host extension value with host-defined equality and debug string.
pub trait OpaqueBacking: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;
    fn equals(&self, other: &dyn OpaqueBacking) -> bool;
    fn debug_string(&self) -> String;
    fn is_zero_value(&self) -> bool;
}

/// `(enum-type, signed integer)` — an `enum` value. The numeric value is
/// the canonical form; names are schema metadata looked up through the
/// reflector, not carried on the value itself.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub enum_type: Type,
    pub number: i32,
}

#[derive(Debug, Clone)]
enum OptionalState {
    Present(Box<Value>),
    Absent,
}

/// `optional<E>`: present-with-value or absent.
#[derive(Debug, Clone)]
pub struct OptionalValue {
    element_type: Type,
    state: OptionalState,
}

impl OptionalValue {
    pub fn present(element_type: Type, value: Value) -> OptionalValue {
        OptionalValue {
            element_type,
            state: OptionalState::Present(Box::new(value)),
        }
    }

    pub fn absent(element_type: Type) -> OptionalValue {
        OptionalValue {
            element_type,
            state: OptionalState::Absent,
        }
    }

    pub fn element_type(&self) -> &Type {
        &self.element_type
    }

    pub fn is_present(&self) -> bool {
        matches!(self.state, OptionalState::Present(_))
    }

    /// `None` on absent rather than panicking — callers must test
    /// `is_present` first; calling this on an absent optional is a caller
    /// bug, not a recoverable condition.
    pub fn value(&self) -> Option<&Value> {
        match &self.state {
            OptionalState::Present(v) => Some(v),
            OptionalState::Absent => None,
        }
    }
}

/// The runtime value. Cloning is cheap: every
/// heap-shaped payload is a handle (`Handle<T>` or `Arc<T>`), never a deep
/// copy.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    Bytes(Handle<[u8]>),
    String(Handle<str>),
    Duration(Duration),
    Timestamp(Timestamp),
    List(Arc<dyn ListBacking>),
    Map(Arc<dyn MapBacking>),
    Struct(Arc<dyn StructBacking>),
    Type(Type),
    Enum(EnumValue),
    Opaque(Arc<dyn OpaqueBacking>),
    Optional(Box<OptionalValue>),
    Error(Arc<CelError>),
    Unknown(Arc<Unknown>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Handle::Rc(Arc::from(s)))
    }

    pub fn bytes(b: &[u8]) -> Value {
        Value::Bytes(Handle::Rc(Arc::from(b)))
    }

    pub fn error(e: CelError) -> Value {
        Value::Error(Arc::new(e))
    }

    pub fn unknown(u: Unknown) -> Value {
        Value::Unknown(Arc::new(u))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Double(_) => Kind::Double,
            Value::Bytes(_) => Kind::Bytes,
            Value::String(_) => Kind::String,
            Value::Duration(_) => Kind::Duration,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Struct(_) => Kind::Struct,
            Value::Type(_) => Kind::Type,
            Value::Enum(_) => Kind::Enum,
            Value::Opaque(_) => Kind::Opaque,
            Value::Optional(_) => Kind::Optional,
            Value::Error(_) => Kind::Error,
            Value::Unknown(_) => Kind::Unknown,
        }
    }

    /// The value's type.kind() == v.kind()`
    /// for every non-error, non-unknown value). `error`/`unknown` have no
    /// user-addressable type, so this panics for them — callers
    /// are expected to check `kind().is_control()` first, exactly as they
    /// must before calling `OptionalValue::value()` on an absent optional.
    pub fn value_type(&self) -> Type {
        match self {
            Value::Null => Type::null(),
            Value::Bool(_) => Type::bool(),
            Value::Int(_) => Type::int(),
            Value::Uint(_) => Type::uint(),
            Value::Double(_) => Type::double(),
            Value::Bytes(_) => Type::bytes(),
            Value::String(_) => Type::string(),
            Value::Duration(_) => Type::duration(),
            Value::Timestamp(_) => Type::timestamp(),
            Value::List(l) => Type::raw(crate::types::TypeData::List(l.element_type().clone())),
            Value::Map(m) => Type::raw(crate::types::TypeData::Map(
                m.key_type().clone(),
                m.value_type().clone(),
            )),
            Value::Struct(s) => {
                Type::raw(crate::types::TypeData::Struct(Arc::from(s.type_name())))
            }
            Value::Type(_) => Type::type_(),
            Value::Enum(e) => e.enum_type.clone(),
            Value::Opaque(o) => Type::raw(crate::types::TypeData::Opaque(Arc::from(o.type_name()))),
            Value::Optional(o) => {
                Type::raw(crate::types::TypeData::Optional(o.element_type().clone()))
            }
            Value::Error(_) => panic!("error values have no user-addressable type"),
            Value::Unknown(_) => panic!("unknown values have no user-addressable type"),
        }
    }

    /// Deterministic textual rendering. Calling this
    /// twice on the same value returns the same text.
    pub fn debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => debug::format_int(*i),
            Value::Uint(u) => debug::format_uint(*u),
            Value::Double(d) => debug::format_double(*d),
            Value::Bytes(b) => debug::format_bytes(b),
            Value::String(s) => debug::format_string(s),
            Value::Duration(d) => debug::format_duration(d.seconds, d.nanos),
            Value::Timestamp(t) => debug::format_timestamp(t.seconds, t.nanos),
            Value::List(l) => {
                let parts: Vec<String> = (0..l.len())
                    .map(|i| l.get(i).map(|v| v.debug_string()).unwrap_or_default())
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let mut keys = m.keys();
                keys.sort();
                let parts: Vec<String> = keys
                    .iter()
                    .map(|k| {
                        let v = m.find(k).map(|v| v.debug_string()).unwrap_or_default();
                        format!("{}: {v}", k.to_value().debug_string())
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Struct(s) => {
                let mut names = s.field_names();
                names.sort();
                let parts: Vec<String> = names
                    .iter()
                    .map(|name| {
                        let v = s
                            .get_field_by_name(name)
                            .map(|v| v.debug_string())
                            .unwrap_or_default();
                        format!("{name}: {v}")
                    })
                    .collect();
                format!("{}{{{}}}", s.type_name(), parts.join(", "))
            }
            Value::Type(t) => t.debug_string(),
            Value::Enum(e) => format!("{}({})", e.enum_type.name(), e.number),
            Value::Opaque(o) => o.debug_string(),
            Value::Optional(o) => match o.value() {
                Some(v) => format!("optional({})", v.debug_string()),
                None => "optional.none()".to_string(),
            },
            Value::Error(e) => format!("error({e})"),
            Value::Unknown(_) => "unknown".to_string(),
        }
    }

    /// `true` for the kind's neutral element.
    pub fn is_zero_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Double(d) => *d == 0.0,
            Value::Bytes(b) => b.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::Duration(d) => d.is_zero(),
            Value::Timestamp(t) => t.is_epoch(),
            Value::List(l) => l.len() == 0,
            Value::Map(m) => m.len() == 0,
            Value::Struct(_) => false,
            Value::Type(t) => *t == Type::dyn_(),
            Value::Enum(e) => e.number == 0,
            Value::Opaque(o) => o.is_zero_value(),
            Value::Optional(o) => !o.is_present(),
            Value::Error(_) | Value::Unknown(_) => false,
        }
    }

    /// If either operand is `error` or `unknown`, the propagated control
    /// value (leftmost error wins; error beats unknown; unknowns merge by
    /// set union). `None` if neither operand is a control
    /// value, meaning the caller should proceed with an ordinary operation.
    pub fn propagate_control(a: &Value, b: &Value) -> Option<Value> {
        if matches!(a, Value::Error(_)) {
            return Some(a.clone());
        }
        if matches!(b, Value::Error(_)) {
            return Some(b.clone());
        }
        match (a, b) {
            (Value::Unknown(u1), Value::Unknown(u2)) => {
                Some(Value::unknown(u1.merge(u2)))
            }
            (Value::Unknown(_), _) => Some(a.clone()),
            (_, Value::Unknown(_)) => Some(b.clone()),
            _ => None,
        }
    }

    /// Equality. Returns a `Value`, not a raw `bool`: equality against an
    /// error or unknown value yields that error/unknown, not a boolean.
    pub fn equal(&self, other: &Value) -> Value {
        if let Some(control) = Value::propagate_control(self, other) {
            return control;
        }
        Value::Bool(self.equal_bool(other))
    }

    /// The non-control-propagating comparison used internally by container
    /// element/key comparisons, where invariant 5 already guarantees
    /// neither side is error/unknown.
    fn equal_bool(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Uint(a), Uint(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Int(a), Uint(b)) => numeric::equal(Numeric::Int(*a), Numeric::Uint(*b)),
            (Uint(a), Int(b)) => numeric::equal(Numeric::Uint(*a), Numeric::Int(*b)),
            (Int(a), Double(b)) => numeric::equal(Numeric::Int(*a), Numeric::Double(*b)),
            (Double(a), Int(b)) => numeric::equal(Numeric::Double(*a), Numeric::Int(*b)),
            (Uint(a), Double(b)) => numeric::equal(Numeric::Uint(*a), Numeric::Double(*b)),
            (Double(a), Uint(b)) => numeric::equal(Numeric::Double(*a), Numeric::Uint(*b)),
            (Bytes(a), Bytes(b)) => &**a == &**b,
            (String(a), String(b)) => &**a == &**b,
            (Duration(a), Duration(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (List(a), List(b)) => {
                a.len() == b.len()
                    && (0..a.len()).all(|i| match (a.get(i), b.get(i)) {
                        (Some(x), Some(y)) => x.equal_bool(&y),
                        _ => false,
                    })
            }
            (Map(a), Map(b)) => {
                a.len() == b.len()
                    && a.keys().into_iter().all(|k| match (a.find(&k), b.find(&k)) {
                        (Some(x), Some(y)) => x.equal_bool(&y),
                        _ => false,
                    })
            }
            (Struct(a), Struct(b)) => {
                a.type_name() == b.type_name()
                    && a.field_names().len() == b.field_names().len()
                    && a.field_names().into_iter().all(|name| {
                        match (a.get_field_by_name(&name), b.get_field_by_name(&name)) {
                            (Some(x), Some(y)) => x.equal_bool(&y),
                            _ => false,
                        }
                    })
            }
            (Type(a), Type(b)) => a == b,
            (Enum(a), Enum(b)) => a.enum_type == b.enum_type && a.number == b.number,
            (Opaque(a), Opaque(b)) => a.type_name() == b.type_name() && a.equals(b.as_ref()),
            (Optional(a), Optional(b)) => match (a.value(), b.value()) {
                (None, None) => true,
                (Some(x), Some(y)) => x.equal_bool(y),
                _ => false,
            },
            _ => false,
        }
    }

    // --- string/bytes operations ---

    pub fn string_size(&self) -> Value {
        match self {
            Value::String(s) => Value::Int(s.chars().count() as i64),
            v => Value::error(CelError::invalid_argument(format!(
                "size() on non-string kind {}",
                v.kind()
            ))),
        }
    }

    pub fn bytes_size(&self) -> Value {
        match self {
            Value::Bytes(b) => Value::Int(b.len() as i64),
            v => Value::error(CelError::invalid_argument(format!(
                "size() on non-bytes kind {}",
                v.kind()
            ))),
        }
    }

    /// `size()` dispatched across every kind it's defined for: string
    /// (codepoint count, not byte length), bytes (byte length), list and map
    /// (element count).
    pub fn size(&self) -> Value {
        match self {
            Value::String(_) => self.string_size(),
            Value::Bytes(_) => self.bytes_size(),
            Value::List(_) => self.list_size(),
            Value::Map(_) => self.map_size(),
            v => Value::error(CelError::invalid_argument(format!(
                "size() on non-sizable kind {}",
                v.kind()
            ))),
        }
    }

    // --- list operations ---

    pub fn list_size(&self) -> Value {
        match self {
            Value::List(l) => Value::Int(l.len() as i64),
            v => Value::error(CelError::invalid_argument(format!(
                "size() on non-list kind {}",
                v.kind()
            ))),
        }
    }

    pub fn list_get(&self, index: i64) -> Value {
        let Value::List(l) = self else {
            return Value::error(CelError::invalid_argument(format!(
                "get() on non-list kind {}",
                self.kind()
            )));
        };
        if index < 0 || index as usize >= l.len() {
            return Value::error(CelError::out_of_range(format!(
                "index {index} out of range for list of length {}",
                l.len()
            )));
        }
        match l.get(index as usize) {
            Some(v) => v.into_owned(),
            None => Value::error(CelError::internal("list backing lied about its length")),
        }
    }

    /// Visits elements in order until `f` returns `false` or the list ends.
    pub fn list_for_each(&self, mut f: impl FnMut(&Value) -> bool) {
        if let Value::List(l) = self {
            for i in 0..l.len() {
                let Some(v) = l.get(i) else { break };
                if !f(&v) {
                    break;
                }
            }
        }
    }

    // --- map operations ---

    pub fn map_size(&self) -> Value {
        match self {
            Value::Map(m) => Value::Int(m.len() as i64),
            v => Value::error(CelError::invalid_argument(format!(
                "size() on non-map kind {}",
                v.kind()
            ))),
        }
    }

    pub fn map_get(&self, key: &MapKey) -> Value {
        let Value::Map(m) = self else {
            return Value::error(CelError::invalid_argument(format!(
                "get() on non-map kind {}",
                self.kind()
            )));
        };
        match m.find(key) {
            Some(v) => v.into_owned(),
            None => Value::error(CelError::not_found(format!(
                "no such key: {}",
                key.to_value().debug_string()
            ))),
        }
    }

    /// `(value, present)` — `value` is `Value::Null` when absent, avoiding
    /// an extra `Option` layer at the evaluator boundary.
    pub fn map_find(&self, key: &MapKey) -> (Value, bool) {
        match self {
            Value::Map(m) => match m.find(key) {
                Some(v) => (v.into_owned(), true),
                None => (Value::Null, false),
            },
            v => (
                Value::error(CelError::invalid_argument(format!(
                    "find() on non-map kind {}",
                    v.kind()
                ))),
                false,
            ),
        }
    }

    pub fn map_has(&self, key: &MapKey) -> Value {
        match self {
            Value::Map(m) => Value::Bool(m.find(key).is_some()),
            v => Value::error(CelError::invalid_argument(format!(
                "has() on non-map kind {}",
                v.kind()
            ))),
        }
    }

    pub fn map_for_each(&self, mut f: impl FnMut(&MapKey, &Value) -> bool) {
        if let Value::Map(m) = self {
            for key in m.keys() {
                let Some(v) = m.find(&key) else { continue };
                if !f(&key, &v) {
                    break;
                }
            }
        }
    }

    // --- struct operations ---

    pub fn struct_get_field_by_name(&self, name: &str) -> Value {
        let Value::Struct(s) = self else {
            return Value::error(CelError::invalid_argument(format!(
                "get_field_by_name() on non-struct kind {}",
                self.kind()
            )));
        };
        match s.get_field_by_name(name) {
            Some(v) => v.into_owned(),
            None => Value::error(CelError::not_found(format!("no such field: {name}"))),
        }
    }

    pub fn struct_get_field_by_number(&self, number: i32) -> Value {
        let Value::Struct(s) = self else {
            return Value::error(CelError::invalid_argument(format!(
                "get_field_by_number() on non-struct kind {}",
                self.kind()
            )));
        };
        match s.get_field_by_number(number) {
            Some(v) => v.into_owned(),
            None => Value::error(CelError::not_found(format!("no such field: #{number}"))),
        }
    }

    pub fn struct_has_field_by_name(&self, name: &str) -> Value {
        match self {
            Value::Struct(s) => Value::Bool(s.has_field_by_name(name)),
            v => Value::error(CelError::invalid_argument(format!(
                "has_field_by_name() on non-struct kind {}",
                v.kind()
            ))),
        }
    }

    pub fn struct_has_field_by_number(&self, number: i32) -> Value {
        match self {
            Value::Struct(s) => Value::Bool(s.has_field_by_number(number)),
            v => Value::error(CelError::invalid_argument(format!(
                "has_field_by_number() on non-struct kind {}",
                v.kind()
            ))),
        }
    }

    /// The `qualify` fast path: delegates to the backing, then
    /// keeps resolving any remaining qualifiers against the returned value
    /// generically, so callers never need to special-case "backing
    /// consumed nothing."
    pub fn qualify(&self, qualifiers: &[Qualifier]) -> Value {
        let Value::Struct(s) = self else {
            return Value::error(CelError::invalid_argument(format!(
                "qualify() on non-struct kind {}",
                self.kind()
            )));
        };
        let (mut current, consumed) = s.qualify(qualifiers);
        let mut remaining = &qualifiers[consumed.min(qualifiers.len())..];
        while let Some((qualifier, rest)) = remaining.split_first() {
            if matches!(current, Value::Error(_) | Value::Unknown(_)) {
                return current;
            }
            current = apply_qualifier(&current, qualifier);
            remaining = rest;
        }
        current
    }
}

fn apply_qualifier(value: &Value, qualifier: &Qualifier) -> Value {
    match qualifier {
        Qualifier::Field(name) => value.struct_get_field_by_name(name),
        Qualifier::Index(i) => value.list_get(*i),
        Qualifier::Key(k) => value.map_get(k),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equal_bool(other)
    }
}

/// A host-free, schema-free map backing over owned values — used by tests
/// and by the reflector's struct/map builders when no foreign schema is
/// involved (runtime crate also ships a protobuf-backed `MapBacking`).
#[derive(Debug)]
pub struct OwnedMap {
    key_type: Type,
    value_type: Type,
    entries: BTreeMap<MapKey, Value>,
}

impl OwnedMap {
    pub fn new(key_type: Type, value_type: Type, entries: BTreeMap<MapKey, Value>) -> OwnedMap {
        OwnedMap {
            key_type,
            value_type,
            entries,
        }
    }
}

impl MapBacking for OwnedMap {
    fn key_type(&self) -> &Type {
        &self.key_type
    }

    fn value_type(&self) -> &Type {
        &self.value_type
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn find(&self, key: &MapKey) -> Option<Cow<'_, Value>> {
        self.entries.get(key).map(Cow::Borrowed)
    }

    fn keys(&self) -> Vec<MapKey> {
        self.entries.keys().cloned().collect()
    }
}

/// A host-free, schema-free list backing over owned values — the native
/// counterpart to [`OwnedMap`].
#[derive(Debug)]
pub struct OwnedList {
    element_type: Type,
    elements: Vec<Value>,
}

impl OwnedList {
    pub fn new(element_type: Type, elements: Vec<Value>) -> OwnedList {
        OwnedList {
            element_type,
            elements,
        }
    }
}

impl ListBacking for OwnedList {
    fn element_type(&self) -> &Type {
        &self.element_type
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn get(&self, index: usize) -> Option<Cow<'_, Value>> {
        self.elements.get(index).map(Cow::Borrowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned_list(values: Vec<Value>) -> Value {
        Value::List(Arc::new(OwnedList::new(Type::dyn_(), values)))
    }

    fn owned_map(entries: Vec<(MapKey, Value)>) -> Value {
        Value::Map(Arc::new(OwnedMap::new(
            Type::dyn_(),
            Type::dyn_(),
            entries.into_iter().collect(),
        )))
    }

    #[test]
    fn s1_s2_s3_cross_numeric_equality_scenarios() {
        assert_eq!(Value::Int(1).equal(&Value::Uint(1)), Value::Bool(true));
        assert_eq!(Value::Double(1.0).equal(&Value::Int(1)), Value::Bool(true));
        assert_eq!(
            Value::Double(f64::NAN).equal(&Value::Double(f64::NAN)),
            Value::Bool(false)
        );
    }

    #[test]
    fn s4_list_index_out_of_range() {
        let list = owned_list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let result = list.list_get(3);
        assert!(matches!(&result, Value::Error(e) if e.code == crate::error::ErrorCode::OutOfRange));
    }

    #[test]
    fn s5_map_missing_key() {
        let map = owned_map(vec![(MapKey::String(Arc::from("a")), Value::Int(1))]);
        let result = map.map_get(&MapKey::String(Arc::from("b")));
        assert!(matches!(&result, Value::Error(e) if e.code == crate::error::ErrorCode::NotFound));
    }

    #[test]
    fn s6_s7_duration_bounds() {
        assert!(Duration::from_seconds(MAX_SECONDS).is_ok());
        assert!(Duration::from_seconds(MAX_SECONDS + 1).is_err());
    }

    #[test]
    fn s9_absent_optional_equality() {
        let a = Value::Optional(Box::new(OptionalValue::absent(Type::dyn_())));
        let b = Value::Optional(Box::new(OptionalValue::absent(Type::dyn_())));
        assert_eq!(a.equal(&b), Value::Bool(true));
    }

    #[test]
    fn s10_string_size_is_codepoint_count() {
        assert_eq!(Value::string("héllo").debug_string(), "\"héllo\"");
        assert_eq!(Value::string("héllo").kind(), Kind::String);
        assert_eq!(Value::string("héllo").size(), Value::Int(5));
        assert_eq!(Value::string("héllo").string_size(), Value::Int(5));
    }

    #[test]
    fn bytes_size_is_byte_length_not_codepoint_count() {
        assert_eq!(Value::bytes("héllo".as_bytes()).size(), Value::Int(6));
    }

    #[test]
    fn size_dispatches_across_sizable_kinds() {
        let list = Value::List(Arc::new(OwnedList::new(
            Type::int(),
            vec![Value::Int(1), Value::Int(2)],
        )));
        assert_eq!(list.size(), Value::Int(2));

        let mut map = std::collections::BTreeMap::new();
        map.insert(MapKey::String(Arc::from("a")), Value::Int(1));
        let map_value = Value::Map(Arc::new(OwnedMap::new(Type::string(), Type::int(), map)));
        assert_eq!(map_value.size(), Value::Int(1));
    }

    #[test]
    fn present_optional_equals_by_inner_value() {
        let a = Value::Optional(Box::new(OptionalValue::present(Type::int(), Value::Int(1))));
        let b = Value::Optional(Box::new(OptionalValue::present(Type::int(), Value::Int(1))));
        let c = Value::Optional(Box::new(OptionalValue::absent(Type::int())));
        assert_eq!(a.equal(&b), Value::Bool(true));
        assert_eq!(a.equal(&c), Value::Bool(false));
    }

    #[test]
    fn error_propagates_leftmost() {
        let e1 = Value::error(CelError::internal("first"));
        let e2 = Value::error(CelError::internal("second"));
        let result = e1.equal(&e2);
        assert!(matches!(&result, Value::Error(e) if e.message == "first"));
    }

    #[test]
    fn error_beats_unknown_regardless_of_side() {
        let e = Value::error(CelError::internal("boom"));
        let u = Value::unknown(Unknown::from_attribute(
            crate::unknown::AttributeTrail::root("x"),
        ));
        assert!(matches!(e.equal(&u), Value::Error(_)));
        assert!(matches!(u.equal(&e), Value::Error(_)));
    }

    #[test]
    fn unknowns_merge_on_equal() {
        let u1 = Value::unknown(Unknown::from_attribute(
            crate::unknown::AttributeTrail::root("x"),
        ));
        let u2 = Value::unknown(Unknown::from_attribute(
            crate::unknown::AttributeTrail::root("y"),
        ));
        if let Value::Unknown(merged) = u1.equal(&u2) {
            assert_eq!(merged.attribute_trails().count(), 2);
        } else {
            panic!("expected unknown");
        }
    }

    #[test]
    fn map_key_rejects_double_including_nan() {
        assert!(MapKey::from_value(&Value::Double(f64::NAN)).is_err());
        assert!(MapKey::from_value(&Value::Double(1.0)).is_err());
    }

    #[test]
    fn zero_values() {
        assert!(Value::Null.is_zero_value());
        assert!(Value::Int(0).is_zero_value());
        assert!(!Value::Int(1).is_zero_value());
        assert!(Value::string("").is_zero_value());
        assert!(!Value::string("x").is_zero_value());
        assert!(Value::Type(Type::dyn_()).is_zero_value());
        assert!(!Value::Type(Type::int()).is_zero_value());
    }

    #[test]
    fn list_equality_is_elementwise() {
        let a = owned_list(vec![Value::Int(1), Value::Int(2)]);
        let b = owned_list(vec![Value::Int(1), Value::Int(2)]);
        let c = owned_list(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a.equal(&b), Value::Bool(true));
        assert_eq!(a.equal(&c), Value::Bool(false));
    }

    #[test]
    fn map_equality_is_unordered() {
        let a = owned_map(vec![
            (MapKey::String(Arc::from("a")), Value::Int(1)),
            (MapKey::String(Arc::from("b")), Value::Int(2)),
        ]);
        let b = owned_map(vec![
            (MapKey::String(Arc::from("b")), Value::Int(2)),
            (MapKey::String(Arc::from("a")), Value::Int(1)),
        ]);
        assert_eq!(a.equal(&b), Value::Bool(true));
    }

    #[test]
    fn value_type_kind_matches_value_kind() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(1),
            Value::Uint(1),
            Value::Double(1.0),
            Value::string("x"),
            Value::bytes(b"x"),
        ];
        for v in values {
            assert_eq!(v.value_type().kind(), v.kind());
        }
    }

    #[test]
    fn list_type_reflects_element_type() {
        let list = owned_list(vec![Value::Int(1)]);
        assert_eq!(list.value_type().kind(), Kind::List);
        assert_eq!(list.value_type().element_type(), Some(&Type::dyn_()));
    }
}
