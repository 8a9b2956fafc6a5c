//! `google.protobuf` well-known types used by the catalog.
//!
//! Timestamp and Duration have a special JSON form (see [`crate::codec::json`]).

use crate::protocol::descriptor::{FieldDescriptor, MessageDescriptor, ScalarType};
use crate::protocol::error::Result;
use crate::protocol::pool::DescriptorPool;

pub const TIMESTAMP: &str = "google.protobuf.Timestamp";
pub const DURATION: &str = "google.protobuf.Duration";
pub const EMPTY: &str = "google.protobuf.Empty";

pub fn register(pool: &mut DescriptorPool) -> Result<()> {
    for name in [TIMESTAMP, DURATION] {
        pool.add_message(
            MessageDescriptor::builder(name)
                .field(FieldDescriptor::scalar(1, "seconds", ScalarType::Int64))
                .field(FieldDescriptor::scalar(2, "nanos", ScalarType::Int32))
                .build()?,
        )?;
    }
    pool.add_message(MessageDescriptor::builder(EMPTY).build()?)?;
    Ok(())
}
