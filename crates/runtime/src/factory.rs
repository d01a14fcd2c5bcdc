//! TypeFactory / ValueFactory — the sole
//! constructors for parameterized types and heap-shaped values, and the
//! home of the interning cache ("two calls with equal
//! arguments return the same handle").
//!
//! The cache shape (a `Mutex`-guarded `HashMap` keyed by argument identity)
//! is grounded on Seq's `crates/runtime/src/pool.rs` object-pool
//! pattern: a shared cache multiple evaluation threads may consult between
//! (never during) evaluations. `Type` already implements
//! `Eq + Hash` by handle identity (`crates/core/src/types.rs`), so caching
//! by the argument `Type`s themselves — rather than by their names — is
//! both simpler and correct: two calls with different-but-equal argument
//! *handles* would otherwise collide on name and wrongly share a cache
//! slot before those handles are unified.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cel_values_core::{
    CelError, Duration, MemoryManager, OwnedList, OwnedMap, Primitive, Timestamp, Type, TypeData,
    Value,
};

/// Interns parameterized [`Type`]s. Builtin, unparameterized kinds are
/// already process-lifetime singletons (`Type::int()` and friends) and pass
/// straight through without touching a cache.
pub struct TypeFactory {
    list_cache: Mutex<HashMap<Type, Type>>,
    map_cache: Mutex<HashMap<(Type, Type), Type>>,
    optional_cache: Mutex<HashMap<Type, Type>>,
    struct_cache: Mutex<HashMap<Arc<str>, Type>>,
    enum_cache: Mutex<HashMap<Arc<str>, Type>>,
    opaque_cache: Mutex<HashMap<Arc<str>, Type>>,
}

impl TypeFactory {
    pub fn new() -> TypeFactory {
        TypeFactory {
            list_cache: Mutex::new(HashMap::new()),
            map_cache: Mutex::new(HashMap::new()),
            optional_cache: Mutex::new(HashMap::new()),
            struct_cache: Mutex::new(HashMap::new()),
            enum_cache: Mutex::new(HashMap::new()),
            opaque_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn list(&self, element: Type) -> Type {
        let mut cache = self.list_cache.lock().unwrap();
        cache
            .entry(element.clone())
            .or_insert_with(|| Type::raw(TypeData::List(element)))
            .clone()
    }

    pub fn map(&self, key: Type, value: Type) -> Type {
        let mut cache = self.map_cache.lock().unwrap();
        cache
            .entry((key.clone(), value.clone()))
            .or_insert_with(|| Type::raw(TypeData::Map(key, value)))
            .clone()
    }

    pub fn optional(&self, element: Type) -> Type {
        let mut cache = self.optional_cache.lock().unwrap();
        cache
            .entry(element.clone())
            .or_insert_with(|| Type::raw(TypeData::Optional(element)))
            .clone()
    }

    pub fn struct_type(&self, name: impl Into<Arc<str>>) -> Type {
        let name = name.into();
        let mut cache = self.struct_cache.lock().unwrap();
        cache
            .entry(name.clone())
            .or_insert_with(|| Type::raw(TypeData::Struct(name)))
            .clone()
    }

    pub fn enum_type(&self, name: impl Into<Arc<str>>) -> Type {
        let name = name.into();
        let mut cache = self.enum_cache.lock().unwrap();
        cache
            .entry(name.clone())
            .or_insert_with(|| Type::raw(TypeData::Enum(name)))
            .clone()
    }

    pub fn opaque(&self, name: impl Into<Arc<str>>) -> Type {
        let name = name.into();
        let mut cache = self.opaque_cache.lock().unwrap();
        cache
            .entry(name.clone())
            .or_insert_with(|| Type::raw(TypeData::Opaque(name)))
            .clone()
    }

    pub fn wrapper(&self, primitive: Primitive) -> Type {
        Type::wrapper(primitive)
    }
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructs values, pairing each factory with the [`MemoryManager`]
/// its string/bytes payloads allocate through — the memory manager
/// reference is carried alongside every factory.
pub struct ValueFactory {
    types: TypeFactory,
    manager: Arc<MemoryManager>,
}

impl ValueFactory {
    pub fn new(manager: Arc<MemoryManager>) -> ValueFactory {
        ValueFactory {
            types: TypeFactory::new(),
            manager,
        }
    }

    pub fn types(&self) -> &TypeFactory {
        &self.types
    }

    pub fn manager(&self) -> &Arc<MemoryManager> {
        &self.manager
    }

    pub fn null(&self) -> Value {
        Value::Null
    }

    pub fn bool(&self, v: bool) -> Value {
        Value::Bool(v)
    }

    pub fn int(&self, v: i64) -> Value {
        Value::Int(v)
    }

    pub fn uint(&self, v: u64) -> Value {
        Value::Uint(v)
    }

    pub fn double(&self, v: f64) -> Value {
        Value::Double(v)
    }

    /// `&str` is already valid UTF-8 by construction — a checked
    /// constructor only matters when the source is raw
    /// bytes, below.
    pub fn string(&self, s: &str) -> Value {
        Value::String(self.manager.allocate_str(s))
    }

    pub fn string_from_utf8(&self, bytes: Vec<u8>) -> Result<Value, CelError> {
        let s = String::from_utf8(bytes)
            .map_err(|e| CelError::invalid_argument(format!("invalid UTF-8: {e}")))?;
        Ok(self.string(&s))
    }

    pub fn bytes(&self, raw: &[u8]) -> Value {
        Value::Bytes(self.manager.allocate_bytes(raw))
    }

    pub fn duration(&self, seconds: i64, nanos: i32) -> Result<Value, CelError> {
        Duration::new(seconds, nanos).map(Value::Duration)
    }

    pub fn timestamp(&self, seconds: i64, nanos: i32) -> Result<Value, CelError> {
        Timestamp::new(seconds, nanos).map(Value::Timestamp)
    }

    pub fn empty_list(&self, element_type: Type) -> Value {
        Value::List(Arc::new(OwnedList::new(element_type, Vec::new())))
    }

    pub fn empty_map(&self, key_type: Type, value_type: Type) -> Value {
        Value::Map(Arc::new(OwnedMap::new(
            key_type,
            value_type,
            std::collections::BTreeMap::new(),
        )))
    }

    pub fn absent_optional(&self, element_type: Type) -> Value {
        Value::Optional(Box::new(cel_values_core::OptionalValue::absent(
            element_type,
        )))
    }

    pub fn present_optional(&self, element_type: Type, value: Value) -> Value {
        Value::Optional(Box::new(cel_values_core::OptionalValue::present(
            element_type,
            value,
        )))
    }

    pub fn list_builder(&self, element_type: Type) -> crate::builder::ListBuilder {
        crate::builder::ListBuilder::new(element_type)
    }

    pub fn map_builder(&self, key_type: Type, value_type: Type) -> crate::builder::MapBuilder {
        crate::builder::MapBuilder::new(key_type, value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_values_core::Type;

    #[test]
    fn list_type_is_interned_per_element_type() {
        let factory = TypeFactory::new();
        let a = factory.list(Type::int());
        let b = factory.list(Type::int());
        assert_eq!(a, b);
        let c = factory.list(Type::string());
        assert_ne!(a, c);
    }

    #[test]
    fn map_type_is_interned_per_key_value_pair() {
        let factory = TypeFactory::new();
        let a = factory.map(Type::string(), Type::int());
        let b = factory.map(Type::string(), Type::int());
        assert_eq!(a, b);
        let c = factory.map(Type::string(), Type::uint());
        assert_ne!(a, c);
    }

    #[test]
    fn struct_type_is_interned_per_name() {
        let factory = TypeFactory::new();
        let a = factory.struct_type("demo.Thing");
        let b = factory.struct_type("demo.Thing");
        assert_eq!(a, b);
    }

    #[test]
    fn value_factory_allocates_strings_through_the_memory_manager() {
        let manager = Arc::new(MemoryManager::ReferenceCounting);
        let factory = ValueFactory::new(manager);
        let v = factory.string("hello");
        assert_eq!(v, Value::string("hello"));
    }

    #[test]
    fn duration_rejects_out_of_range_seconds() {
        let manager = Arc::new(MemoryManager::ReferenceCounting);
        let factory = ValueFactory::new(manager);
        assert!(factory.duration(315_576_000_001, 0).is_err());
    }
}
