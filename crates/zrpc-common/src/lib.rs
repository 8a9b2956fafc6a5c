//! zrpc Common Types, Codecs and Transport
//!
//! This crate provides the descriptor model, the protobuf wire and JSON codecs,
//! the status model and the transport layer shared by the zrpc server, client
//! and CLI.
//!
//! # Overview
//!
//! Messages are not generated structs. Each message type is described at
//! runtime by a [`MessageDescriptor`] registered in a [`DescriptorPool`], and
//! values are dynamic [`MessageValue`] trees interpreted against it:
//!
//! - **Protocol Layer**: descriptors, dynamic values, status codes, errors
//! - **Codec Layer**: varints, binary wire format, canonical JSON, validation
//! - **Catalog**: built-in schemas (well-known types, ZITADEL actions, echo)
//! - **Transport Layer**: the [`Transport`](transport::Transport) trait and a
//!   Connect-style HTTP implementation
//!
//! # Architecture
//!
//! - **Wire format**: protobuf binary, byte-compatible with any conforming
//!   protobuf implementation
//! - **Transport**: HTTP/1.1 POST to `/<package>.<Service>/<Method>`
//! - **Errors**: `{"code": "...", "message": "..."}` with a mapped HTTP status
//!
//! # Example
//!
//! ```
//! use zrpc_common::catalog;
//! use zrpc_common::codec::wire;
//! use zrpc_common::MessageValue;
//!
//! let pool = catalog::builtin_pool().unwrap();
//! let desc = pool.message("zitadel.action.v3alpha.GetTargetByIDRequest").unwrap();
//!
//! let request = MessageValue::new().with("target_id", "t1");
//! let bytes = wire::encode(&pool, desc, &request).unwrap();
//! assert_eq!(bytes, b"\x0a\x02t1");
//! assert_eq!(wire::decode(&pool, desc, &bytes).unwrap(), request);
//! ```

pub mod catalog;
pub mod codec;
pub mod protocol;
pub mod transport;

pub use protocol::*;
