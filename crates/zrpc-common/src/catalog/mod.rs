//! Built-in Schema Catalog
//!
//! Descriptors for the message and service types this workspace ships with:
//!
//! - `google.protobuf`: Timestamp, Duration, Empty
//! - `zitadel.object.v2beta`: object details and list queries
//! - `zitadel.action.v3alpha`: targets, executions, `ActionService`
//! - `zrpc.echo.v1`: `EchoService`, exercising every field kind
//!
//! Custom schemas are registered the same way: build descriptors, add them to
//! a [`DescriptorPool`], then call [`DescriptorPool::validate`].

pub mod action;
pub mod echo;
pub mod object;
pub mod wkt;

use crate::protocol::error::Result;
use crate::protocol::pool::DescriptorPool;

/// Declares every built-in descriptor and validates all references.
pub fn builtin_pool() -> Result<DescriptorPool> {
    let mut pool = DescriptorPool::new();
    wkt::register(&mut pool)?;
    object::register(&mut pool)?;
    action::register(&mut pool)?;
    echo::register(&mut pool)?;
    pool.validate()?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::codec::wire;
    use crate::protocol::value::{MessageValue, Value};

    #[test]
    fn test_builtin_pool_validates() {
        let pool = builtin_pool().unwrap();
        assert!(pool.message(action::TARGET).is_ok());
        assert!(pool.message(action::CONDITION).is_ok());
        assert!(pool.service(action::SERVICE).is_some());
        assert!(pool.service(echo::SERVICE).is_some());
    }

    #[test]
    fn test_action_service_table() {
        let pool = builtin_pool().unwrap();
        let service = pool.service(action::SERVICE).unwrap();
        assert_eq!(service.methods().len(), 11);

        let method = service.method("ListTargets").unwrap();
        assert_eq!(method.path(), "/zitadel.action.v3alpha.ActionService/ListTargets");
        assert_eq!(method.input_type(), "zitadel.action.v3alpha.ListTargetsRequest");
        assert_eq!(method.output_type(), "zitadel.action.v3alpha.ListTargetsResponse");
    }

    #[test]
    fn test_organisation_alias_is_bit_identical() {
        let pool = builtin_pool().unwrap();
        let organization = pool.message(object::ORGANIZATION).unwrap();
        let organisation = pool.message(object::ORGANISATION).unwrap();
        assert!(Arc::ptr_eq(organization, organisation));

        let value = MessageValue::new().with("org_domain", "example.com");
        assert_eq!(
            wire::encode(&pool, organization, &value).unwrap(),
            wire::encode(&pool, organisation, &value).unwrap()
        );
    }

    #[test]
    fn test_condition_cycle_roundtrip() {
        let pool = builtin_pool().unwrap();
        let desc = pool.message(action::CONDITION).unwrap();
        // Condition -> function, nested inside ExecutionTargetType -> include -> Condition
        let execution = pool.message("zitadel.action.v3alpha.Execution").unwrap();
        let value = MessageValue::new()
            .with(
                "Condition",
                MessageValue::new().with("request", MessageValue::new().with("all", true)),
            )
            .with(
                "targets",
                vec![Value::Message(MessageValue::new().with(
                    "include",
                    MessageValue::new()
                        .with("function", MessageValue::new().with("name", "presignup")),
                ))],
            );

        let bytes = wire::encode(&pool, execution, &value).unwrap();
        let decoded = wire::decode(&pool, execution, &bytes).unwrap();
        assert_eq!(decoded, value.normalized(&pool, execution).unwrap());
        assert!(desc.oneof("condition_type").is_some());
    }
}
