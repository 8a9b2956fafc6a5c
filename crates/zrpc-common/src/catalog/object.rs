//! `zitadel.object.v2beta`: shared object metadata and list queries.

use super::wkt;
use crate::protocol::descriptor::{EnumDescriptor, FieldDescriptor, MessageDescriptor, ScalarType};
use crate::protocol::error::Result;
use crate::protocol::pool::DescriptorPool;

pub const PACKAGE: &str = "zitadel.object.v2beta";

pub const DETAILS: &str = "zitadel.object.v2beta.Details";
pub const LIST_DETAILS: &str = "zitadel.object.v2beta.ListDetails";
pub const LIST_QUERY: &str = "zitadel.object.v2beta.ListQuery";
pub const TEXT_QUERY_METHOD: &str = "zitadel.object.v2beta.TextQueryMethod";
pub const ORGANIZATION: &str = "zitadel.object.v2beta.Organization";
/// Legacy spelling, resolved to [`ORGANIZATION`].
pub const ORGANISATION: &str = "zitadel.object.v2beta.Organisation";

pub fn register(pool: &mut DescriptorPool) -> Result<()> {
    pool.add_enum(EnumDescriptor::new(
        TEXT_QUERY_METHOD,
        [
            ("TEXT_QUERY_METHOD_EQUALS", 0),
            ("TEXT_QUERY_METHOD_EQUALS_IGNORE_CASE", 1),
            ("TEXT_QUERY_METHOD_STARTS_WITH", 2),
            ("TEXT_QUERY_METHOD_STARTS_WITH_IGNORE_CASE", 3),
            ("TEXT_QUERY_METHOD_CONTAINS", 4),
            ("TEXT_QUERY_METHOD_CONTAINS_IGNORE_CASE", 5),
            ("TEXT_QUERY_METHOD_ENDS_WITH", 6),
            ("TEXT_QUERY_METHOD_ENDS_WITH_IGNORE_CASE", 7),
        ],
    )?)?;
    pool.add_enum(EnumDescriptor::new(
        "zitadel.object.v2beta.ListQueryMethod",
        [("LIST_QUERY_METHOD_IN", 0)],
    )?)?;
    pool.add_enum(EnumDescriptor::new(
        "zitadel.object.v2beta.TimestampQueryMethod",
        [
            ("TIMESTAMP_QUERY_METHOD_EQUALS", 0),
            ("TIMESTAMP_QUERY_METHOD_GREATER", 1),
            ("TIMESTAMP_QUERY_METHOD_GREATER_OR_EQUALS", 2),
            ("TIMESTAMP_QUERY_METHOD_LESS", 3),
            ("TIMESTAMP_QUERY_METHOD_LESS_OR_EQUALS", 4),
        ],
    )?)?;

    pool.add_message(
        MessageDescriptor::builder(ORGANIZATION)
            .field(FieldDescriptor::scalar(1, "org_id", ScalarType::String).in_oneof("org"))
            .field(FieldDescriptor::scalar(2, "org_domain", ScalarType::String).in_oneof("org"))
            .build()?,
    )?;
    pool.alias(ORGANISATION, ORGANIZATION)?;

    pool.add_message(
        MessageDescriptor::builder("zitadel.object.v2beta.RequestContext")
            .field(
                FieldDescriptor::scalar(1, "org_id", ScalarType::String)
                    .in_oneof("resource_owner"),
            )
            .field(
                FieldDescriptor::scalar(2, "instance", ScalarType::Bool)
                    .in_oneof("resource_owner"),
            )
            .build()?,
    )?;

    pool.add_message(
        MessageDescriptor::builder(LIST_QUERY)
            .field(FieldDescriptor::scalar(1, "offset", ScalarType::Uint64))
            .field(FieldDescriptor::scalar(2, "limit", ScalarType::Uint32))
            .field(FieldDescriptor::scalar(3, "asc", ScalarType::Bool))
            .build()?,
    )?;

    pool.add_message(
        MessageDescriptor::builder(DETAILS)
            .field(FieldDescriptor::scalar(1, "sequence", ScalarType::Uint64))
            .field(FieldDescriptor::message(2, "change_date", wkt::TIMESTAMP))
            .field(FieldDescriptor::scalar(3, "resource_owner", ScalarType::String))
            .build()?,
    )?;

    pool.add_message(
        MessageDescriptor::builder(LIST_DETAILS)
            .field(FieldDescriptor::scalar(1, "total_result", ScalarType::Uint64))
            .field(FieldDescriptor::scalar(2, "processed_sequence", ScalarType::Uint64))
            .field(FieldDescriptor::message(3, "timestamp", wkt::TIMESTAMP))
            .build()?,
    )?;

    Ok(())
}
