//! # zrpc CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Host the echo service
//! zrpc serve -b 127.0.0.1:8080
//!
//! # Call a method (outputs raw JSON)
//! zrpc call http://127.0.0.1:8080 /zrpc.echo.v1.EchoService/Echo -a '{"stringValue": "hi"}'
//!
//! # Convert between JSON and wire bytes
//! zrpc encode zitadel.action.v3alpha.GetTargetByIDRequest -j '{"targetId": "t1"}'
//! zrpc decode zitadel.action.v3alpha.GetTargetByIDRequest 0a027431
//!
//! # Show a declaration
//! zrpc describe zitadel.action.v3alpha.Target
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use argh::FromArgs;
use zrpc_cli::convert::{self, ByteFormat};
use zrpc_cli::describe::describe;
use zrpc_client::{ClientConfig, ZrpcClient};
use zrpc_common::catalog;
use zrpc_common::transport::CallOptions;
use zrpc_server::{echo, HttpServer, Router, ServerConfig};

#[derive(FromArgs)]
/// zrpc - descriptor-driven protobuf RPC
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
    Encode(EncodeArgs),
    Decode(DecodeArgs),
    Describe(DescribeArgs),
}

/// Arguments for hosting the echo service.
///
/// The bind address comes from `-b`, then `ZRPC_BIND`, then `0.0.0.0:8080`.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// host zrpc.echo.v1.EchoService over HTTP
struct ServeArgs {
    /// address to bind the HTTP server to
    #[argh(option, short = 'b')]
    bind: Option<String>,

    /// maximum request body size in bytes
    #[argh(option, long = "max-body-bytes", default = "zrpc_server::config::DEFAULT_MAX_BODY_BYTES")]
    max_body_bytes: usize,

    /// deadline for calls that do not send connect-timeout-ms
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method and print the response as JSON
struct CallArgs {
    /// server URL (must include http:// or https://)
    #[argh(positional)]
    server_address: String,

    /// method path, e.g. /zrpc.echo.v1.EchoService/Echo
    #[argh(positional)]
    path: String,

    /// request as canonical JSON
    #[argh(option, short = 'a', long = "args", default = "\"{}\".into()")]
    args: String,

    /// call timeout in milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// metadata header as name=value; may be repeated
    #[argh(option, short = 'H', long = "header")]
    headers: Vec<String>,

    /// reject unknown fields and oneof conflicts before sending
    #[argh(switch)]
    strict: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "encode")]
/// encode a JSON message to wire bytes
struct EncodeArgs {
    /// fully-qualified message type
    #[argh(positional)]
    message: String,

    /// message as canonical JSON
    #[argh(option, short = 'j', long = "json", default = "\"{}\".into()")]
    json: String,

    /// print base64 instead of hex
    #[argh(switch)]
    base64: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "decode")]
/// decode wire bytes to JSON
struct DecodeArgs {
    /// fully-qualified message type
    #[argh(positional)]
    message: String,

    /// encoded message, hex unless --base64 is given
    #[argh(positional)]
    bytes: String,

    /// read base64 instead of hex
    #[argh(switch)]
    base64: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "describe")]
/// print a message, enum or service declaration
struct DescribeArgs {
    /// fully-qualified name
    #[argh(positional)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Only the server logs; the other commands keep stdout clean for piping.
    if matches!(cli.command, Commands::Serve(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
        Commands::Encode(args) => {
            let pool = catalog::builtin_pool()?;
            let format = ByteFormat::from_flag(args.base64);
            println!("{}", convert::encode(&pool, &args.message, &args.json, format)?);
            Ok(())
        }
        Commands::Decode(args) => {
            let pool = catalog::builtin_pool()?;
            let format = ByteFormat::from_flag(args.base64);
            println!("{}", convert::decode(&pool, &args.message, &args.bytes, format)?);
            Ok(())
        }
        Commands::Describe(args) => {
            let pool = catalog::builtin_pool()?;
            println!("{}", describe(&pool, &args.name)?);
            Ok(())
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let bind = zrpc_cli::resolve_bind(args.bind, std::env::var(zrpc_cli::BIND_ENV).ok());
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| anyhow!("Invalid bind address {}: {}", bind, e))?;

    let mut config = ServerConfig::new().with_max_body_bytes(args.max_body_bytes);
    if let Some(ms) = args.timeout_ms {
        config = config.with_default_timeout(Duration::from_millis(ms));
    }
    config.validate()?;

    let pool = Arc::new(catalog::builtin_pool()?);
    let registry = echo::registry(pool)?;
    tracing::info!("Serving {:?}", registry.service_names());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", addr, e))?;
    let server = HttpServer::with_config(Router::new(registry), config);
    server
        .serve_with_shutdown(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn run_call(args: CallArgs) -> Result<()> {
    convert::validate_http_url(&args.server_address, "server address")?;

    let pool = Arc::new(catalog::builtin_pool()?);
    let (_, method) = pool
        .find_method(&args.path)
        .ok_or_else(|| anyhow!("Unknown method path '{}'", args.path))?;
    let request = convert::message_from_json(&pool, method.input_type(), &args.args)?;
    let output_type = method.output_type().to_string();

    let mut options = CallOptions::new();
    if let Some(ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    for header in &args.headers {
        let (name, value) = convert::parse_header(header)?;
        options = options.with_metadata(name, value);
    }

    let client = ZrpcClient::http(&args.server_address, Arc::clone(&pool))
        .with_config(ClientConfig::new().strict(args.strict))?;
    let response = client.invoke_path(&args.path, &request, options).await?;

    // Output raw JSON to stdout
    let json = convert::message_to_json(&pool, &output_type, &response)?;
    println!("{}", serde_json::to_string(&json)?);

    Ok(())
}
