//! Descriptor Pool
//!
//! An arena of message, enum and service descriptors keyed by fully-qualified
//! name. Descriptors only hold names of the types they reference; the pool
//! resolves those names on demand, so mutually recursive schemas need no
//! shared ownership cycles.
//!
//! # Architecture
//!
//! ```text
//!   add_message / add_enum / add_service / alias
//!                      │
//!                      ▼
//!             ┌────────────────┐   validate()   every FieldKind::Message,
//!             │ DescriptorPool │ ───────────▶ FieldKind::Enum and method
//!             └────────────────┘                type resolves
//!                      │
//!                      ▼  Arc<DescriptorPool>
//!          codecs, registry, client (read-only)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{
    split_method_path, EnumDescriptor, FieldKind, MessageDescriptor, MethodDescriptor,
    ServiceDescriptor,
};
use super::error::{Result, ZrpcError};

/// Registry of all schema descriptors known to a process.
#[derive(Debug, Default, Clone)]
pub struct DescriptorPool {
    messages: HashMap<String, Arc<MessageDescriptor>>,
    enums: HashMap<String, Arc<EnumDescriptor>>,
    services: HashMap<String, Arc<ServiceDescriptor>>,
    aliases: HashMap<String, String>,
}

impl DescriptorPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.messages.contains_key(name)
            || self.enums.contains_key(name)
            || self.aliases.contains_key(name)
        {
            return Err(ZrpcError::InvalidDescriptor(format!(
                "type `{}` is declared twice",
                name
            )));
        }
        Ok(())
    }

    pub fn add_message(&mut self, message: MessageDescriptor) -> Result<Arc<MessageDescriptor>> {
        self.ensure_free(message.full_name())?;
        let message = Arc::new(message);
        self.messages
            .insert(message.full_name().to_string(), Arc::clone(&message));
        Ok(message)
    }

    pub fn add_enum(&mut self, enumeration: EnumDescriptor) -> Result<Arc<EnumDescriptor>> {
        self.ensure_free(enumeration.full_name())?;
        let enumeration = Arc::new(enumeration);
        self.enums
            .insert(enumeration.full_name().to_string(), Arc::clone(&enumeration));
        Ok(enumeration)
    }

    pub fn add_service(&mut self, service: ServiceDescriptor) -> Result<Arc<ServiceDescriptor>> {
        if self.services.contains_key(service.full_name()) {
            return Err(ZrpcError::InvalidDescriptor(format!(
                "service `{}` is declared twice",
                service.full_name()
            )));
        }
        let service = Arc::new(service);
        self.services
            .insert(service.full_name().to_string(), Arc::clone(&service));
        Ok(service)
    }

    /// Makes `alias` resolve to the type named `target`.
    ///
    /// Both names then denote the very same descriptor, so values encode
    /// identically under either name.
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) -> Result<()> {
        let alias = alias.into();
        let target = target.into();
        self.ensure_free(&alias)?;
        if self.aliases.contains_key(&target) {
            return Err(ZrpcError::InvalidDescriptor(format!(
                "alias `{}` points at another alias `{}`",
                alias, target
            )));
        }
        self.aliases.insert(alias, target);
        Ok(())
    }

    fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Resolves a message by full name or alias.
    ///
    /// # Errors
    ///
    /// Returns [`ZrpcError::UnknownMessage`] when no such message exists.
    pub fn message(&self, name: &str) -> Result<&Arc<MessageDescriptor>> {
        self.messages
            .get(self.canonical(name))
            .ok_or_else(|| ZrpcError::UnknownMessage(name.to_string()))
    }

    pub fn enumeration(&self, name: &str) -> Result<&Arc<EnumDescriptor>> {
        self.enums
            .get(self.canonical(name))
            .ok_or_else(|| ZrpcError::InvalidDescriptor(format!("unknown enum `{}`", name)))
    }

    pub fn service(&self, name: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(name)
    }

    /// Resolves `/<package>.<Service>/<Method>` to its service and method.
    pub fn find_method(&self, path: &str) -> Option<(&Arc<ServiceDescriptor>, &MethodDescriptor)> {
        let (service_name, method_name) = split_method_path(path)?;
        let service = self.services.get(service_name)?;
        let method = service.method(method_name)?;
        Some((service, method))
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = self.canonical(name);
        self.messages.contains_key(name) || self.enums.contains_key(name)
    }

    /// Message names, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        sorted_keys(&self.messages)
    }

    pub fn enum_names(&self) -> Vec<&str> {
        sorted_keys(&self.enums)
    }

    pub fn service_names(&self) -> Vec<&str> {
        sorted_keys(&self.services)
    }

    /// Checks that every type reference in the pool resolves.
    ///
    /// Call once after all descriptors are declared. Message and enum names
    /// must refer to the right kind of type; aliases must point at an existing
    /// message or enum; service method input and output types must be
    /// messages.
    pub fn validate(&self) -> Result<()> {
        for (alias, target) in &self.aliases {
            if !self.messages.contains_key(target) && !self.enums.contains_key(target) {
                return Err(ZrpcError::InvalidDescriptor(format!(
                    "alias `{}` points at unknown type `{}`",
                    alias, target
                )));
            }
        }

        for message in self.messages.values() {
            for field in message.fields() {
                self.check_kind(field.kind()).map_err(|err| {
                    ZrpcError::InvalidDescriptor(format!(
                        "{}.{}: {}",
                        message.full_name(),
                        field.name(),
                        err
                    ))
                })?;
            }
        }

        for service in self.services.values() {
            for method in service.methods() {
                for type_name in [method.input_type(), method.output_type()] {
                    if self.message(type_name).is_err() {
                        return Err(ZrpcError::UnknownMessage(format!(
                            "{} (used by {})",
                            type_name,
                            method.path()
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn check_kind(&self, kind: &FieldKind) -> std::result::Result<(), String> {
        match kind {
            FieldKind::Scalar(_) => Ok(()),
            FieldKind::Enum(name) => self
                .enumeration(name)
                .map(|_| ())
                .map_err(|_| format!("unknown enum `{}`", name)),
            FieldKind::Message(name) => self
                .message(name)
                .map(|_| ())
                .map_err(|_| format!("unknown message `{}`", name)),
            FieldKind::Map { value, .. } => self.check_kind(value),
        }
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::descriptor::{FieldDescriptor, ScalarType};

    fn condition_pool() -> DescriptorPool {
        let mut pool = DescriptorPool::new();
        pool.add_message(
            MessageDescriptor::builder("test.Condition")
                .field(FieldDescriptor::message(1, "include", "test.Target"))
                .build()
                .unwrap(),
        )
        .unwrap();
        pool.add_message(
            MessageDescriptor::builder("test.Target")
                .field(FieldDescriptor::message(1, "condition", "test.Condition"))
                .build()
                .unwrap(),
        )
        .unwrap();
        pool
    }

    #[test]
    fn test_cyclic_references_validate() {
        let pool = condition_pool();
        pool.validate().unwrap();
    }

    #[test]
    fn test_dangling_reference_fails_validation() {
        let mut pool = condition_pool();
        pool.add_message(
            MessageDescriptor::builder("test.Broken")
                .field(FieldDescriptor::message(1, "missing", "test.Missing"))
                .build()
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(
            pool.validate(),
            Err(ZrpcError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_enum_reference_must_be_enum() {
        let mut pool = condition_pool();
        pool.add_message(
            MessageDescriptor::builder("test.Wrong")
                .field(FieldDescriptor::enumeration(1, "kind", "test.Target"))
                .build()
                .unwrap(),
        )
        .unwrap();
        assert!(pool.validate().is_err());
    }

    #[test]
    fn test_alias_resolves_to_same_descriptor() {
        let mut pool = DescriptorPool::new();
        pool.add_message(
            MessageDescriptor::builder("test.Organization")
                .field(FieldDescriptor::scalar(1, "org_id", ScalarType::String))
                .build()
                .unwrap(),
        )
        .unwrap();
        pool.alias("test.Organisation", "test.Organization").unwrap();
        pool.validate().unwrap();

        let a = pool.message("test.Organization").unwrap();
        let b = pool.message("test.Organisation").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert!(pool.alias("test.Organisation", "test.Organization").is_err());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let mut pool = condition_pool();
        let result = pool.add_message(MessageDescriptor::builder("test.Target").build().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_message() {
        let pool = DescriptorPool::new();
        assert!(matches!(
            pool.message("nope.Nothing"),
            Err(ZrpcError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_find_method() {
        let mut pool = condition_pool();
        pool.add_service(
            ServiceDescriptor::builder("test", "Finder")
                .method(MethodDescriptor::unary("Find", "test.Condition", "test.Target"))
                .build()
                .unwrap(),
        )
        .unwrap();
        pool.validate().unwrap();

        let (service, method) = pool.find_method("/test.Finder/Find").unwrap();
        assert_eq!(service.full_name(), "test.Finder");
        assert_eq!(method.output_type(), "test.Target");
        assert!(pool.find_method("/test.Finder/Lose").is_none());
    }

    #[test]
    fn test_service_with_unknown_type_fails_validation() {
        let mut pool = DescriptorPool::new();
        pool.add_service(
            ServiceDescriptor::builder("test", "Broken")
                .method(MethodDescriptor::unary("Go", "test.In", "test.Out"))
                .build()
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(
            pool.validate(),
            Err(ZrpcError::UnknownMessage(_))
        ));
    }
}
