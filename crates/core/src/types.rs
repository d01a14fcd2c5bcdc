//! The Type model.
//!
//! A `Type` is a cheap handle (`Arc<TypeData>`) whose equality is identity,
//! not structure: two calls with equal arguments must return the same
//! handle, so equality has to actually compare pointers. This mirrors how
//! Seq compares `Arc<VariantData>`/`ChannelData` handles in
//! `crates/runtime/src/value.rs` (`Arc::ptr_eq`, not field comparison).
//!
//! Builtin, unparameterized kinds (`null`, `bool`, ..., the six wrappers) are
//! process-lifetime singletons built once behind a `OnceLock`. Parameterized
//! kinds (`list<E>`, `map<K,V>`, `optional<E>`, `struct<Name>`,
//! `enum<Name>`) are *not* interned here — `Type::raw` builds a fresh handle
//! every call; interning them is `TypeFactory`'s job
//! (`crates/runtime/src/factory.rs`), which caches by argument and only then
//! calls `Type::raw`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::kind::{Kind, Primitive};

/// The data behind a [`Type`] handle. Never compared directly — compare
/// `Type`s, which compare by handle identity.
#[derive(Debug)]
pub enum TypeData {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    Bytes,
    String,
    Duration,
    Timestamp,
    List(Type),
    Map(Type, Type),
    Struct(Arc<str>),
    Type,
    Enum(Arc<str>),
    Opaque(Arc<str>),
    Optional(Type),
    Wrapper(Primitive),
    Error,
    Unknown,
    Dyn,
    Any,
}

/// A handle to a type. Clone is cheap (`Arc` bump); equality is identity.
#[derive(Clone, Debug)]
pub struct Type(Arc<TypeData>);

impl Type {
    /// Build a fresh, un-interned handle. Two calls with the same `data`
    /// produce two *unequal* handles — see module docs. Factories are the
    /// only callers that should use this for parameterized kinds; builtin
    /// singleton accessors below are the only callers for unparameterized
    /// kinds.
    pub fn raw(data: TypeData) -> Type {
        Type(Arc::new(data))
    }

    pub fn data(&self) -> &TypeData {
        &self.0
    }

    pub fn kind(&self) -> Kind {
        match &*self.0 {
            TypeData::Null => Kind::Null,
            TypeData::Bool => Kind::Bool,
            TypeData::Int => Kind::Int,
            TypeData::Uint => Kind::Uint,
            TypeData::Double => Kind::Double,
            TypeData::Bytes => Kind::Bytes,
            TypeData::String => Kind::String,
            TypeData::Duration => Kind::Duration,
            TypeData::Timestamp => Kind::Timestamp,
            TypeData::List(_) => Kind::List,
            TypeData::Map(_, _) => Kind::Map,
            TypeData::Struct(_) => Kind::Struct,
            TypeData::Type => Kind::Type,
            TypeData::Enum(_) => Kind::Enum,
            TypeData::Opaque(_) => Kind::Opaque,
            TypeData::Optional(_) => Kind::Optional,
            TypeData::Wrapper(p) => Kind::Wrapper(*p),
            TypeData::Error => Kind::Error,
            TypeData::Unknown => Kind::Unknown,
            TypeData::Dyn => Kind::Dyn,
            TypeData::Any => Kind::Any,
        }
    }

    /// Canonical textual name, e.g. `list(int)`, `google.protobuf.Timestamp`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Same rendering as [`Type::name`] — a type's debug string *is* its
    /// canonical name.
    pub fn debug_string(&self) -> String {
        self.name()
    }

    /// The element type of `list<E>`/`optional<E>`, if this is one of those.
    pub fn element_type(&self) -> Option<&Type> {
        match &*self.0 {
            TypeData::List(e) | TypeData::Optional(e) => Some(e),
            _ => None,
        }
    }

    /// The key type of `map<K,V>`, if this is a map type.
    pub fn key_type(&self) -> Option<&Type> {
        match &*self.0 {
            TypeData::Map(k, _) => Some(k),
            _ => None,
        }
    }

    /// The value type of `map<K,V>`, if this is a map type.
    pub fn value_type(&self) -> Option<&Type> {
        match &*self.0 {
            TypeData::Map(_, v) => Some(v),
            _ => None,
        }
    }

    /// The wrapped primitive of `wrapper<P>`, if this is a wrapper type.
    pub fn primitive(&self) -> Option<Primitive> {
        match &*self.0 {
            TypeData::Wrapper(p) => Some(*p),
            _ => None,
        }
    }

    /// The host-provided qualified name of `struct<Name>`, if this is one.
    pub fn struct_name(&self) -> Option<&str> {
        match &*self.0 {
            TypeData::Struct(name) => Some(name),
            _ => None,
        }
    }

    /// The host-provided qualified name of `enum<Name>`, if this is one.
    pub fn enum_name(&self) -> Option<&str> {
        match &*self.0 {
            TypeData::Enum(name) => Some(name),
            _ => None,
        }
    }

    /// The host-provided name of an `opaque<Name>` type, if this is one.
    pub fn opaque_name(&self) -> Option<&str> {
        match &*self.0 {
            TypeData::Opaque(name) => Some(name),
            _ => None,
        }
    }

    // Deserialization from a type URL needs the runtime schema authority
    // and so cannot live here without an
    // upward dependency on the protobuf/reflection stack; it is
    // `TypeReflector::deserialize_any(&Type, &[u8])` in
    // `cel-values-runtime::reflect`, which calls back into the constructors
    // on this type.

    pub fn null() -> Type {
        singletons().null.clone()
    }

    pub fn bool() -> Type {
        singletons().bool_.clone()
    }

    pub fn int() -> Type {
        singletons().int.clone()
    }

    pub fn uint() -> Type {
        singletons().uint.clone()
    }

    pub fn double() -> Type {
        singletons().double.clone()
    }

    pub fn bytes() -> Type {
        singletons().bytes.clone()
    }

    pub fn string() -> Type {
        singletons().string.clone()
    }

    pub fn duration() -> Type {
        singletons().duration.clone()
    }

    pub fn timestamp() -> Type {
        singletons().timestamp.clone()
    }

    pub fn type_() -> Type {
        singletons().type_.clone()
    }

    pub fn error() -> Type {
        singletons().error.clone()
    }

    pub fn unknown() -> Type {
        singletons().unknown.clone()
    }

    pub fn dyn_() -> Type {
        singletons().dyn_.clone()
    }

    pub fn any() -> Type {
        singletons().any.clone()
    }

    /// One of the six process-lifetime singleton wrapper types.
    pub fn wrapper(primitive: Primitive) -> Type {
        singletons().wrappers[primitive as usize].clone()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            TypeData::Null => f.write_str("null"),
            TypeData::Bool => f.write_str("bool"),
            TypeData::Int => f.write_str("int"),
            TypeData::Uint => f.write_str("uint"),
            TypeData::Double => f.write_str("double"),
            TypeData::Bytes => f.write_str("bytes"),
            TypeData::String => f.write_str("string"),
            TypeData::Duration => f.write_str("google.protobuf.Duration"),
            TypeData::Timestamp => f.write_str("google.protobuf.Timestamp"),
            TypeData::List(e) => write!(f, "list({e})"),
            TypeData::Map(k, v) => write!(f, "map({k}, {v})"),
            TypeData::Struct(name) => f.write_str(name),
            TypeData::Type => f.write_str("type"),
            TypeData::Enum(name) => f.write_str(name),
            TypeData::Opaque(name) => write!(f, "opaque({name})"),
            TypeData::Optional(e) => write!(f, "optional({e})"),
            TypeData::Wrapper(p) => write!(f, "wrapper({p})"),
            TypeData::Error => f.write_str("error"),
            TypeData::Unknown => f.write_str("unknown"),
            TypeData::Dyn => f.write_str("dyn"),
            TypeData::Any => f.write_str("any"),
        }
    }
}

struct Singletons {
    null: Type,
    bool_: Type,
    int: Type,
    uint: Type,
    double: Type,
    bytes: Type,
    string: Type,
    duration: Type,
    timestamp: Type,
    type_: Type,
    error: Type,
    unknown: Type,
    dyn_: Type,
    any: Type,
    wrappers: [Type; 6],
}

static SINGLETONS: OnceLock<Singletons> = OnceLock::new();

fn singletons() -> &'static Singletons {
    SINGLETONS.get_or_init(|| {
        tracing::debug!("initializing builtin type singletons");
        Singletons {
            null: Type::raw(TypeData::Null),
            bool_: Type::raw(TypeData::Bool),
            int: Type::raw(TypeData::Int),
            uint: Type::raw(TypeData::Uint),
            double: Type::raw(TypeData::Double),
            bytes: Type::raw(TypeData::Bytes),
            string: Type::raw(TypeData::String),
            duration: Type::raw(TypeData::Duration),
            timestamp: Type::raw(TypeData::Timestamp),
            type_: Type::raw(TypeData::Type),
            error: Type::raw(TypeData::Error),
            unknown: Type::raw(TypeData::Unknown),
            dyn_: Type::raw(TypeData::Dyn),
            any: Type::raw(TypeData::Any),
            wrappers: [
                Type::raw(TypeData::Wrapper(Primitive::Bool)),
                Type::raw(TypeData::Wrapper(Primitive::Int)),
                Type::raw(TypeData::Wrapper(Primitive::Uint)),
                Type::raw(TypeData::Wrapper(Primitive::Double)),
                Type::raw(TypeData::Wrapper(Primitive::Bytes)),
                Type::raw(TypeData::Wrapper(Primitive::String)),
            ],
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_singletons_are_identical_across_calls() {
        assert_eq!(Type::int(), Type::int());
        assert!(Arc::ptr_eq(&Type::int().0, &Type::int().0));
    }

    #[test]
    fn distinct_builtins_are_unequal() {
        assert_ne!(Type::int(), Type::uint());
    }

    #[test]
    fn raw_parameterized_types_are_not_auto_interned() {
        let a = Type::raw(TypeData::List(Type::int()));
        let b = Type::raw(TypeData::List(Type::int()));
        assert_ne!(a, b, "Type::raw never interns; that's the factory's job");
    }

    #[test]
    fn wrapper_singletons_round_trip_primitive() {
        let w = Type::wrapper(Primitive::Int);
        assert_eq!(w.kind(), Kind::Wrapper(Primitive::Int));
        assert_eq!(w.primitive(), Some(Primitive::Int));
    }

    #[test]
    fn names_match_canonical_form() {
        assert_eq!(Type::int().name(), "int");
        let list_int = Type::raw(TypeData::List(Type::int()));
        assert_eq!(list_int.name(), "list(int)");
        let map_string_int = Type::raw(TypeData::Map(Type::string(), Type::int()));
        assert_eq!(map_string_int.name(), "map(string, int)");
        assert_eq!(Type::timestamp().name(), "google.protobuf.Timestamp");
    }

    #[test]
    fn sub_accessors_return_none_for_unrelated_kinds() {
        assert!(Type::int().element_type().is_none());
        assert!(Type::int().key_type().is_none());
        assert!(Type::int().primitive().is_none());
    }
}
