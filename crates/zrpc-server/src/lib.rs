//! zrpc Server
//!
//! This crate provides the server side of zrpc: a registry of service
//! implementations, the unary dispatcher that maps every failure onto the
//! status channel, and a hyper-based HTTP server.
//!
//! # Components
//!
//! - [`ServiceRegistry`]: service name → descriptor and per-method handlers
//! - [`Router`]: decode, run handler, encode; records metrics
//! - [`HttpServer`]: HTTP/1.1 front end with `/_health`, `/_metrics`, `/_info`
//! - [`LocalTransport`]: in-process [`Transport`](zrpc_common::transport::Transport)

pub mod config;
pub mod echo;
pub mod http_server;
pub mod local;
pub mod registry;
pub mod router;

pub use config::ServerConfig;
pub use http_server::HttpServer;
pub use local::LocalTransport;
pub use registry::{
    handler_fn, CallContext, Handler, HandlerFuture, Route, ServiceImplementation, ServiceRegistry,
};
pub use router::Router;
