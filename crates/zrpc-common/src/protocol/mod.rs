pub mod descriptor;
pub mod error;
pub mod pool;
pub mod status;
pub mod value;

pub use descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldKind, Label, MessageDescriptor,
    MethodDescriptor, MethodKind, OneofDescriptor, ScalarType, ServiceDescriptor, WireType,
};
pub use error::{Result, ZrpcError};
pub use pool::DescriptorPool;
pub use status::{Code, Status};
pub use value::{MapKey, MessageValue, Value};
