//! TypeIntrospector / TypeReflector.
//!
//! New relative to Seq, which has no host-schema concept. The
//! provider chain lets host schemas (protobuf, flatbuffers, user extensions)
//! stack as a `Vec<Arc<dyn SchemaProvider>>` consulted in order. The protobuf
//! provider wraps `prost_reflect::DescriptorPool`/`MessageDescriptor`, the
//! closest real ecosystem crate to "runtime schema authority" (`prost`/
//! `prost-types` are pack-grounded via `other_examples/manifests/
//! {MystenLabs-sui,aptos-labs-aptos-core}`; `prost-reflect` is the standard
//! reflection layer built on top of `prost`).

use std::sync::{Arc, Mutex};

use cel_values_core::{CelError, Type, TypeData, Value};
use prost_reflect::{DescriptorPool, MessageDescriptor};

use crate::struct_bridge::{self, AnyResolver};

/// Field schema as returned by [`TypeIntrospector::find_field`]: name,
/// number, and declared type.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: Arc<str>,
    pub number: i32,
    pub field_type: Type,
}

/// One schema source in the reflector's provider chain. A host registers a
/// provider per record format it wants struct values to bridge to.
pub trait SchemaProvider: std::fmt::Debug + Send + Sync {
    fn find_type(&self, qualified_name: &str) -> Option<Type>;
    fn find_field(&self, struct_name: &str, field_name: &str) -> Option<FieldSchema>;
    fn new_struct_builder(&self, struct_name: &str) -> Option<crate::builder::StructBuilder>;
    /// Construct a value from a type URL + serialized bytes, if this
    /// provider recognizes the URL. `resolver` lets a nested
    /// `google.protobuf.Any` field inside the decoded message resolve in
    /// turn, rather than surfacing as a raw struct.
    fn deserialize(
        &self,
        type_url: &str,
        bytes: &[u8],
        resolver: &Arc<dyn AnyResolver>,
    ) -> Option<Result<Value, CelError>>;
}

/// Resolves `Any` type URLs against every provider registered with a
/// [`TypeReflector`], so a [`crate::struct_bridge::ProtoStruct`] decoded
/// partway through a deserialize can resolve a nested `Any` field the same
/// way the top-level one did.
#[derive(Debug, Clone)]
struct ProviderChainResolver(Vec<Arc<dyn SchemaProvider>>);

impl AnyResolver for ProviderChainResolver {
    fn resolve_any(&self, type_url: &str, bytes: &[u8]) -> Value {
        let nested: Arc<dyn AnyResolver> = Arc::new(self.clone());
        for provider in &self.0 {
            if let Some(result) = provider.deserialize(type_url, bytes, &nested) {
                return match result {
                    Ok(v) => v,
                    Err(e) => Value::error(e),
                };
            }
        }
        Value::error(CelError::unimplemented(format!(
            "no schema provider recognizes type URL {type_url}"
        )))
    }
}

/// The static schema side: name→type and
/// struct-field lookup.
pub struct TypeIntrospector {
    providers: Vec<Arc<dyn SchemaProvider>>,
}

impl TypeIntrospector {
    pub fn new() -> TypeIntrospector {
        TypeIntrospector {
            providers: Vec::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn SchemaProvider>) {
        self.providers.push(provider);
    }

    pub fn find_type(&self, qualified_name: &str) -> Option<Type> {
        self.providers
            .iter()
            .find_map(|p| p.find_type(qualified_name))
    }

    pub fn find_field(&self, struct_name: &str, field_name: &str) -> Option<FieldSchema> {
        self.providers
            .iter()
            .find_map(|p| p.find_field(struct_name, field_name))
    }
}

impl Default for TypeIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

/// The runtime schema side: hands out builders,
/// deserializes by type URL.
pub struct TypeReflector {
    introspector: TypeIntrospector,
}

impl TypeReflector {
    pub fn new() -> TypeReflector {
        TypeReflector {
            introspector: TypeIntrospector::new(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn SchemaProvider>) {
        self.introspector.register(provider);
    }

    pub fn introspector(&self) -> &TypeIntrospector {
        &self.introspector
    }

    pub fn new_struct_builder(&self, struct_name: &str) -> Option<crate::builder::StructBuilder> {
        self.introspector
            .providers
            .iter()
            .find_map(|p| p.new_struct_builder(struct_name))
    }

    /// Deserialize from a type URL + bytes. An unrecognized type URL is
    /// preserved as `unimplemented` rather than inferring behavior (see
    /// `DESIGN.md` resolution 3).
    pub fn deserialize_any(&self, type_url: &str, bytes: &[u8]) -> Value {
        ProviderChainResolver(self.introspector.providers.clone()).resolve_any(type_url, bytes)
    }
}

impl Default for TypeReflector {
    fn default() -> Self {
        Self::new()
    }
}

/// Protobuf-backed [`SchemaProvider`], wrapping a `prost_reflect::DescriptorPool`.
#[derive(Debug)]
pub struct ProtobufSchemaProvider {
    pool: DescriptorPool,
    // `MessageDescriptor::fields()` allocates per call in `prost-reflect`;
    // cache the (name, number, type) triples we've already derived once.
    field_cache: Mutex<std::collections::HashMap<(String, String), FieldSchema>>,
}

impl ProtobufSchemaProvider {
    pub fn new(pool: DescriptorPool) -> ProtobufSchemaProvider {
        ProtobufSchemaProvider {
            pool,
            field_cache: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn message_descriptor(&self, qualified_name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(qualified_name)
    }
}

impl SchemaProvider for ProtobufSchemaProvider {
    fn find_type(&self, qualified_name: &str) -> Option<Type> {
        self.message_descriptor(qualified_name)
            .map(|_| Type::raw(TypeData::Struct(Arc::from(qualified_name))))
    }

    fn find_field(&self, struct_name: &str, field_name: &str) -> Option<FieldSchema> {
        let cache_key = (struct_name.to_string(), field_name.to_string());
        if let Some(cached) = self.field_cache.lock().unwrap().get(&cache_key) {
            return Some(cached.clone());
        }
        let descriptor = self.message_descriptor(struct_name)?;
        let field = descriptor.get_field_by_name(field_name)?;
        let schema = FieldSchema {
            name: Arc::from(field.name()),
            number: field.number() as i32,
            field_type: crate::struct_bridge::field_kind_to_type(&field),
        };
        self.field_cache
            .lock()
            .unwrap()
            .insert(cache_key, schema.clone());
        Some(schema)
    }

    fn new_struct_builder(&self, struct_name: &str) -> Option<crate::builder::StructBuilder> {
        let descriptor = self.message_descriptor(struct_name)?;
        Some(crate::builder::StructBuilder::for_message(descriptor))
    }

    fn deserialize(
        &self,
        type_url: &str,
        bytes: &[u8],
        resolver: &Arc<dyn AnyResolver>,
    ) -> Option<Result<Value, CelError>> {
        let qualified_name = type_url.rsplit('/').next().unwrap_or(type_url);
        let descriptor = self.message_descriptor(qualified_name)?;
        let message = match prost_reflect::DynamicMessage::decode(descriptor, bytes) {
            Ok(m) => m,
            Err(e) => return Some(Err(CelError::invalid_argument(e.to_string()))),
        };
        Some(Ok(struct_bridge::message_value_to_cel(
            &message,
            Some(resolver),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reflector_is_unimplemented_for_unknown_url() {
        let reflector = TypeReflector::new();
        let result = reflector.deserialize_any("type.googleapis.com/foo.Bar", &[]);
        assert!(matches!(&result, Value::Error(e) if e.code == cel_values_core::ErrorCode::Unimplemented));
    }
}
