// Copyright 2025 zrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # zrpc CLI
//!
//! Command-line interface for zrpc.
//!
//! ## Key Commands
//!
//! - `zrpc serve`: host `zrpc.echo.v1.EchoService` over HTTP
//! - `zrpc call`: invoke a method of the built-in catalog (outputs raw JSON for scripting)
//! - `zrpc encode` / `zrpc decode`: convert between canonical JSON and wire bytes
//! - `zrpc describe`: print a message, enum or service declaration
//!
//! The argument parsing lives in the binary; the conversions it needs live
//! here so they can be tested without spawning a process.

pub mod convert;
pub mod describe;

/// Environment variable overriding the default `serve` bind address.
pub const BIND_ENV: &str = "ZRPC_BIND";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Bind address for `serve`: the flag, then `ZRPC_BIND`, then the default.
pub fn resolve_bind(flag: Option<String>, env: Option<String>) -> String {
    flag.or(env)
        .filter(|addr| !addr.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}
