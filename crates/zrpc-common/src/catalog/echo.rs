//! `zrpc.echo.v1`: a message exercising every field kind and a one-method
//! service returning its input. Served by `zrpc serve` and used in tests.

use super::wkt;
use crate::protocol::descriptor::{
    EnumDescriptor, FieldDescriptor, FieldKind, MessageDescriptor, MethodDescriptor, ScalarType,
    ServiceDescriptor,
};
use crate::protocol::error::Result;
use crate::protocol::pool::DescriptorPool;

pub const PACKAGE: &str = "zrpc.echo.v1";
pub const SERVICE: &str = "zrpc.echo.v1.EchoService";
pub const ECHO_MESSAGE: &str = "zrpc.echo.v1.EchoMessage";
pub const ECHO_STATUS: &str = "zrpc.echo.v1.EchoStatus";
/// Path of the only method.
pub const ECHO_PATH: &str = "/zrpc.echo.v1.EchoService/Echo";

pub fn register(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_enum(EnumDescriptor::new(
        ECHO_STATUS,
        [
            ("ECHO_STATUS_UNSPECIFIED", 0),
            ("ECHO_STATUS_OK", 1),
            ("ECHO_STATUS_FAILED", 2),
        ],
    )?)?;

    let scalars = [
        (1, "int32_value", ScalarType::Int32),
        (2, "int64_value", ScalarType::Int64),
        (3, "uint32_value", ScalarType::Uint32),
        (4, "uint64_value", ScalarType::Uint64),
        (5, "sint32_value", ScalarType::Sint32),
        (6, "sint64_value", ScalarType::Sint64),
        (7, "fixed32_value", ScalarType::Fixed32),
        (8, "fixed64_value", ScalarType::Fixed64),
        (9, "sfixed32_value", ScalarType::Sfixed32),
        (10, "sfixed64_value", ScalarType::Sfixed64),
        (11, "bool_value", ScalarType::Bool),
        (12, "string_value", ScalarType::String),
        (13, "bytes_value", ScalarType::Bytes),
        (14, "double_value", ScalarType::Double),
        (15, "float_value", ScalarType::Float),
    ];

    let mut message = MessageDescriptor::builder(ECHO_MESSAGE);
    for (number, name, scalar) in scalars {
        message = message.field(FieldDescriptor::scalar(number, name, scalar));
    }
    let message = message
        .field(FieldDescriptor::enumeration(16, "status", ECHO_STATUS))
        .field(FieldDescriptor::scalar(17, "optional_int32", ScalarType::Int32).optional())
        .field(FieldDescriptor::message(18, "nested", ECHO_MESSAGE))
        .field(FieldDescriptor::scalar(19, "int32_list", ScalarType::Int32).repeated())
        .field(FieldDescriptor::scalar(20, "string_list", ScalarType::String).repeated())
        .field(
            FieldDescriptor::scalar(21, "unpacked_list", ScalarType::Sint64)
                .repeated()
                .unpacked(),
        )
        .field(FieldDescriptor::map(
            22,
            "labels",
            ScalarType::String,
            FieldKind::Scalar(ScalarType::String),
        ))
        .field(FieldDescriptor::map(
            23,
            "children",
            ScalarType::Int64,
            FieldKind::Message(ECHO_MESSAGE.to_string()),
        ))
        .field(FieldDescriptor::message(24, "timestamp", wkt::TIMESTAMP))
        .field(FieldDescriptor::message(25, "duration", wkt::DURATION))
        .field(FieldDescriptor::scalar(26, "text", ScalarType::String).in_oneof("choice"))
        .field(FieldDescriptor::scalar(27, "number", ScalarType::Int64).in_oneof("choice"))
        .field(FieldDescriptor::enumeration(28, "status_list", ECHO_STATUS).repeated())
        .build()?;
    pool.add_message(message)?;

    pool.add_service(
        ServiceDescriptor::builder(PACKAGE, "EchoService")
            .method(MethodDescriptor::unary("Echo", ECHO_MESSAGE, ECHO_MESSAGE))
            .build()?,
    )?;
    Ok(())
}
