//! `zitadel.action.v3alpha`: targets, executions and the `ActionService` table.
//!
//! `Condition` and `ExecutionTargetType` refer to each other; the pool resolves
//! both names after registration.

use super::{object, wkt};
use crate::protocol::descriptor::{
    EnumDescriptor, FieldDescriptor, MessageDescriptor, MethodDescriptor, ScalarType,
    ServiceDescriptor,
};
use crate::protocol::error::Result;
use crate::protocol::pool::DescriptorPool;

pub const PACKAGE: &str = "zitadel.action.v3alpha";
pub const SERVICE: &str = "zitadel.action.v3alpha.ActionService";

pub const TARGET: &str = "zitadel.action.v3alpha.Target";
pub const CONDITION: &str = "zitadel.action.v3alpha.Condition";

/// `ActionService` methods as `(name, input, output)`, input and output
/// without the package prefix.
pub const METHODS: [(&str, &str, &str); 11] = [
    ("CreateTarget", "CreateTargetRequest", "CreateTargetResponse"),
    ("UpdateTarget", "UpdateTargetRequest", "UpdateTargetResponse"),
    ("DeleteTarget", "DeleteTargetRequest", "DeleteTargetResponse"),
    ("ListTargets", "ListTargetsRequest", "ListTargetsResponse"),
    ("GetTargetByID", "GetTargetByIDRequest", "GetTargetByIDResponse"),
    ("SetExecution", "SetExecutionRequest", "SetExecutionResponse"),
    ("DeleteExecution", "DeleteExecutionRequest", "DeleteExecutionResponse"),
    ("ListExecutions", "ListExecutionsRequest", "ListExecutionsResponse"),
    (
        "ListExecutionFunctions",
        "ListExecutionFunctionsRequest",
        "ListExecutionFunctionsResponse",
    ),
    (
        "ListExecutionMethods",
        "ListExecutionMethodsRequest",
        "ListExecutionMethodsResponse",
    ),
    (
        "ListExecutionServices",
        "ListExecutionServicesRequest",
        "ListExecutionServicesResponse",
    ),
];

fn qualified(name: &str) -> String {
    format!("{}.{}", PACKAGE, name)
}

fn message(name: &str) -> crate::protocol::descriptor::MessageBuilder {
    MessageDescriptor::builder(qualified(name))
}

fn string(number: u32, name: &str) -> FieldDescriptor {
    FieldDescriptor::scalar(number, name, ScalarType::String)
}

fn boolean(number: u32, name: &str) -> FieldDescriptor {
    FieldDescriptor::scalar(number, name, ScalarType::Bool)
}

fn nested(number: u32, name: &str, type_name: &str) -> FieldDescriptor {
    FieldDescriptor::message(number, name, qualified(type_name))
}

pub fn register(pool: &mut DescriptorPool) -> Result<()> {
    register_targets(pool)?;
    register_queries(pool)?;
    register_executions(pool)?;
    register_service_messages(pool)?;

    let mut service = ServiceDescriptor::builder(PACKAGE, "ActionService");
    for (name, input, output) in METHODS {
        service = service.method(MethodDescriptor::unary(
            name,
            qualified(input),
            qualified(output),
        ));
    }
    pool.add_service(service.build()?)?;
    Ok(())
}

fn register_targets(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_message(
        message("SetRESTWebhook")
            .field(boolean(1, "interrupt_on_error"))
            .build()?,
    )?;
    pool.add_message(
        message("SetRESTCall")
            .field(boolean(1, "interrupt_on_error"))
            .build()?,
    )?;
    pool.add_message(message("SetRESTAsync").build()?)?;

    pool.add_message(
        message("Target")
            .field(string(1, "target_id"))
            .field(FieldDescriptor::message(2, "details", object::DETAILS))
            .field(string(3, "name"))
            .field(nested(4, "rest_webhook", "SetRESTWebhook").in_oneof("target_type"))
            .field(nested(5, "rest_call", "SetRESTCall").in_oneof("target_type"))
            .field(nested(6, "rest_async", "SetRESTAsync").in_oneof("target_type"))
            .field(FieldDescriptor::message(7, "timeout", wkt::DURATION))
            .field(string(8, "endpoint"))
            .build()?,
    )?;
    Ok(())
}

fn register_queries(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_enum(EnumDescriptor::new(
        qualified("ExecutionType"),
        [
            ("EXECUTION_TYPE_UNSPECIFIED", 0),
            ("EXECUTION_TYPE_REQUEST", 1),
            ("EXECUTION_TYPE_RESPONSE", 2),
            ("EXECUTION_TYPE_EVENT", 3),
            ("EXECUTION_TYPE_FUNCTION", 4),
        ],
    )?)?;
    pool.add_enum(EnumDescriptor::new(
        qualified("TargetFieldName"),
        [
            ("FIELD_NAME_UNSPECIFIED", 0),
            ("FIELD_NAME_ID", 1),
            ("FIELD_NAME_CREATION_DATE", 2),
            ("FIELD_NAME_CHANGE_DATE", 3),
            ("FIELD_NAME_NAME", 4),
            ("FIELD_NAME_TARGET_TYPE", 5),
            ("FIELD_NAME_URL", 6),
            ("FIELD_NAME_TIMEOUT", 7),
            ("FIELD_NAME_ASYNC", 8),
            ("FIELD_NAME_INTERRUPT_ON_ERROR", 9),
        ],
    )?)?;

    pool.add_message(
        message("SearchQuery")
            .field(nested(1, "in_conditions_query", "InConditionsQuery").in_oneof("query"))
            .field(nested(2, "execution_type_query", "ExecutionTypeQuery").in_oneof("query"))
            .field(nested(3, "target_query", "TargetQuery").in_oneof("query"))
            .field(nested(4, "include_query", "IncludeQuery").in_oneof("query"))
            .build()?,
    )?;
    pool.add_message(
        message("InConditionsQuery")
            .field(nested(1, "conditions", "Condition").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("ExecutionTypeQuery")
            .field(FieldDescriptor::enumeration(
                1,
                "execution_type",
                qualified("ExecutionType"),
            ))
            .build()?,
    )?;
    pool.add_message(message("TargetQuery").field(string(1, "target_id")).build()?)?;
    pool.add_message(
        message("IncludeQuery")
            .field(nested(1, "include", "Condition"))
            .build()?,
    )?;

    pool.add_message(
        message("TargetSearchQuery")
            .field(nested(1, "target_name_query", "TargetNameQuery").in_oneof("query"))
            .field(nested(2, "in_target_ids_query", "InTargetIDsQuery").in_oneof("query"))
            .build()?,
    )?;
    pool.add_message(
        message("TargetNameQuery")
            .field(string(1, "target_name"))
            .field(FieldDescriptor::enumeration(2, "method", object::TEXT_QUERY_METHOD))
            .build()?,
    )?;
    pool.add_message(
        message("InTargetIDsQuery")
            .field(string(1, "target_ids").repeated())
            .build()?,
    )?;
    Ok(())
}

fn register_executions(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_message(
        message("Execution")
            // capitalized in the published schema; JSON name stays "Condition"
            .field(nested(1, "Condition", "Condition"))
            .field(FieldDescriptor::message(2, "details", object::DETAILS))
            .field(nested(3, "targets", "ExecutionTargetType").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("ExecutionTargetType")
            .field(string(1, "target").in_oneof("type"))
            .field(nested(2, "include", "Condition").in_oneof("type"))
            .build()?,
    )?;
    pool.add_message(
        message("Condition")
            .field(nested(1, "request", "RequestExecution").in_oneof("condition_type"))
            .field(nested(2, "response", "ResponseExecution").in_oneof("condition_type"))
            .field(nested(3, "function", "FunctionExecution").in_oneof("condition_type"))
            .field(nested(4, "event", "EventExecution").in_oneof("condition_type"))
            .build()?,
    )?;
    for name in ["RequestExecution", "ResponseExecution"] {
        pool.add_message(
            message(name)
                .field(string(1, "method").in_oneof("condition"))
                .field(string(2, "service").in_oneof("condition"))
                .field(boolean(3, "all").in_oneof("condition"))
                .build()?,
        )?;
    }
    pool.add_message(message("FunctionExecution").field(string(1, "name")).build()?)?;
    pool.add_message(
        message("EventExecution")
            .field(string(1, "event").in_oneof("condition"))
            .field(string(2, "group").in_oneof("condition"))
            .field(boolean(3, "all").in_oneof("condition"))
            .build()?,
    )?;
    Ok(())
}

fn register_service_messages(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_message(
        message("CreateTargetRequest")
            .field(string(1, "name"))
            .field(nested(2, "rest_webhook", "SetRESTWebhook").in_oneof("target_type"))
            .field(nested(3, "rest_call", "SetRESTCall").in_oneof("target_type"))
            .field(nested(4, "rest_async", "SetRESTAsync").in_oneof("target_type"))
            .field(FieldDescriptor::message(5, "timeout", wkt::DURATION))
            .field(string(6, "endpoint"))
            .build()?,
    )?;
    pool.add_message(
        message("CreateTargetResponse")
            .field(string(1, "id"))
            .field(FieldDescriptor::message(2, "details", object::DETAILS))
            .build()?,
    )?;

    pool.add_message(
        message("UpdateTargetRequest")
            .field(string(1, "target_id"))
            .field(string(2, "name").optional())
            .field(nested(3, "rest_webhook", "SetRESTWebhook").in_oneof("target_type"))
            .field(nested(4, "rest_call", "SetRESTCall").in_oneof("target_type"))
            .field(nested(5, "rest_async", "SetRESTAsync").in_oneof("target_type"))
            .field(FieldDescriptor::message(6, "timeout", wkt::DURATION))
            .field(string(7, "endpoint").optional())
            .build()?,
    )?;

    for name in [
        "UpdateTargetResponse",
        "DeleteTargetResponse",
        "DeleteExecutionResponse",
    ] {
        pool.add_message(
            message(name)
                .field(FieldDescriptor::message(1, "details", object::DETAILS))
                .build()?,
        )?;
    }
    // details sits in field 2 here
    pool.add_message(
        message("SetExecutionResponse")
            .field(FieldDescriptor::message(2, "details", object::DETAILS))
            .build()?,
    )?;

    for name in ["DeleteTargetRequest", "GetTargetByIDRequest"] {
        pool.add_message(message(name).field(string(1, "target_id")).build()?)?;
    }

    pool.add_message(
        message("ListTargetsRequest")
            .field(FieldDescriptor::message(1, "query", object::LIST_QUERY))
            .field(FieldDescriptor::enumeration(
                2,
                "sorting_column",
                qualified("TargetFieldName"),
            ))
            .field(nested(3, "queries", "TargetSearchQuery").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("ListTargetsResponse")
            .field(FieldDescriptor::message(1, "details", object::LIST_DETAILS))
            .field(FieldDescriptor::enumeration(
                2,
                "sorting_column",
                qualified("TargetFieldName"),
            ))
            .field(nested(3, "result", "Target").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("GetTargetByIDResponse")
            .field(nested(1, "target", "Target"))
            .build()?,
    )?;

    pool.add_message(
        message("SetExecutionRequest")
            .field(nested(1, "condition", "Condition"))
            .field(nested(2, "targets", "ExecutionTargetType").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("DeleteExecutionRequest")
            .field(nested(1, "condition", "Condition"))
            .build()?,
    )?;
    pool.add_message(
        message("ListExecutionsRequest")
            .field(FieldDescriptor::message(1, "query", object::LIST_QUERY))
            .field(nested(2, "queries", "SearchQuery").repeated())
            .build()?,
    )?;
    pool.add_message(
        message("ListExecutionsResponse")
            .field(FieldDescriptor::message(1, "details", object::LIST_DETAILS))
            .field(nested(2, "result", "Execution").repeated())
            .build()?,
    )?;

    for (request, response, list) in [
        (
            "ListExecutionFunctionsRequest",
            "ListExecutionFunctionsResponse",
            "functions",
        ),
        (
            "ListExecutionMethodsRequest",
            "ListExecutionMethodsResponse",
            "methods",
        ),
        (
            "ListExecutionServicesRequest",
            "ListExecutionServicesResponse",
            "services",
        ),
    ] {
        pool.add_message(message(request).build()?)?;
        pool.add_message(message(response).field(string(1, list).repeated()).build()?)?;
    }
    Ok(())
}
