//! Renders descriptors from the pool as `.proto`-style declarations.

use std::fmt::Write;

use anyhow::{anyhow, Result};
use zrpc_common::protocol::{
    DescriptorPool, EnumDescriptor, FieldDescriptor, Label, MessageDescriptor, MethodKind,
    ServiceDescriptor,
};

/// Looks `name` up as a message (or alias), an enum, then a service.
pub fn describe(pool: &DescriptorPool, name: &str) -> Result<String> {
    if let Ok(message) = pool.message(name) {
        return Ok(message_declaration(message));
    }
    if let Ok(enumeration) = pool.enumeration(name) {
        return Ok(enum_declaration(enumeration));
    }
    if let Some(service) = pool.service(name) {
        return Ok(service_declaration(service));
    }
    Err(anyhow!("`{}` is not a known message, enum or service", name))
}

pub fn message_declaration(message: &MessageDescriptor) -> String {
    let mut out = format!("message {} {{\n", message.full_name());

    for field in message.fields().iter().filter(|field| field.oneof().is_none()) {
        let _ = writeln!(out, "  {}", field_line(field));
    }
    for oneof in message.oneofs() {
        let _ = writeln!(out, "  oneof {} {{", oneof.name());
        for member in oneof.fields() {
            if let Some(field) = message.field(member) {
                let _ = writeln!(out, "    {}", field_line(field));
            }
        }
        out.push_str("  }\n");
    }

    out.push('}');
    out
}

fn field_line(field: &FieldDescriptor) -> String {
    let label = match field.label() {
        Label::Repeated if !field.is_map() => "repeated ",
        Label::Optional => "optional ",
        _ => "",
    };
    let packed = if field.is_list() && field.kind().is_packable() && !field.is_packed() {
        " [packed = false]"
    } else {
        ""
    };
    format!(
        "{}{} {} = {}{};",
        label,
        field.kind(),
        field.name(),
        field.number(),
        packed
    )
}

pub fn enum_declaration(enumeration: &EnumDescriptor) -> String {
    let mut out = format!("enum {} {{\n", enumeration.full_name());
    for value in enumeration.values() {
        let _ = writeln!(out, "  {} = {};", value.name, value.number);
    }
    out.push('}');
    out
}

pub fn service_declaration(service: &ServiceDescriptor) -> String {
    let mut out = format!("service {} {{\n", service.full_name());
    for method in service.methods() {
        let (client, server) = match method.kind() {
            MethodKind::Unary => ("", ""),
            MethodKind::ClientStreaming => ("stream ", ""),
            MethodKind::ServerStreaming => ("", "stream "),
            MethodKind::BidiStreaming => ("stream ", "stream "),
        };
        let _ = writeln!(
            out,
            "  rpc {}({}{}) returns ({}{});  // {}",
            method.name(),
            client,
            method.input_type(),
            server,
            method.output_type(),
            method.path()
        );
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zrpc_common::catalog::{self, action, echo, object};

    fn pool() -> DescriptorPool {
        catalog::builtin_pool().unwrap()
    }

    #[test]
    fn test_describe_target() {
        let text = describe(&pool(), action::TARGET).unwrap();
        assert!(text.starts_with("message zitadel.action.v3alpha.Target {"));
        assert!(text.contains("  string target_id = 1;"));
        assert!(text.contains("  oneof target_type {"));
        assert!(text.contains("    zitadel.action.v3alpha.SetRESTWebhook rest_webhook = 4;"));
        assert!(text.ends_with('}'));
    }

    #[test]
    fn test_describe_labels() {
        let text = describe(&pool(), echo::ECHO_MESSAGE).unwrap();
        assert!(text.contains("  optional int32 optional_int32 = 17;"));
        assert!(text.contains("  repeated int32 int32_list = 19;"));
        assert!(text.contains("  repeated sint64 unpacked_list = 21 [packed = false];"));
        assert!(text.contains("  map<string, string> labels = 22;"));
    }

    #[test]
    fn test_describe_alias_resolves() {
        let pool = pool();
        assert_eq!(
            describe(&pool, object::ORGANISATION).unwrap(),
            describe(&pool, object::ORGANIZATION).unwrap()
        );
    }

    #[test]
    fn test_describe_enum_and_service() {
        let pool = pool();
        let text = describe(&pool, echo::ECHO_STATUS).unwrap();
        assert!(text.contains("  ECHO_STATUS_OK = 1;"));

        let text = describe(&pool, echo::SERVICE).unwrap();
        assert!(text.contains(
            "  rpc Echo(zrpc.echo.v1.EchoMessage) returns (zrpc.echo.v1.EchoMessage);  // /zrpc.echo.v1.EchoService/Echo"
        ));
    }

    #[test]
    fn test_describe_unknown() {
        assert!(describe(&pool(), "zitadel.nothing.Nothing").is_err());
    }
}
