//! s3lite server: a minimal S3-compatible object storage gateway.
//!
//! # Usage
//!
//! ```text
//! S3LITE_LISTEN=0.0.0.0:9000 s3lite-server
//! s3lite-server --health-check
//! ```
//!
//! # Environment Variables
//!
//! See [`GatewayConfig::from_env`] for the full list. The ones most often set:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3LITE_LISTEN` | `0.0.0.0:9000` | Bind address |
//! | `S3LITE_DOMAIN` | `s3.localhost` | Virtual hosting domain |
//! | `S3LITE_PRESIGN_SECRET` | *(random per process)* | Presigned URL signing key |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use s3lite_auth::PresignSigner;
use s3lite_core::reaper::spawn_upload_reaper;
use s3lite_core::utils::generate_secret;
use s3lite_core::{GatewayConfig, ObjectGateway};
use s3lite_http::{GatewayHandler, S3HttpConfig, S3HttpService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Accept connections until ctrl-c, then stop the reaper and drain in-flight
/// requests.
async fn serve(
    listener: TcpListener,
    service: S3HttpService<GatewayHandler>,
    stop_reaper: watch::Sender<bool>,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let builder = HttpConnBuilder::new(TokioExecutor::new());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for ctrl-c, shutting down");
                }
                break;
            }
        };

        let conn = builder
            .serve_connection(TokioIo::new(stream), service.clone())
            .into_owned();
        let conn = graceful.watch(conn);
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!(%peer_addr, error = %e, "connection failed");
            }
        });
    }

    info!("shutdown requested, draining connections");
    stop_reaper.send(true).ok();
    graceful.shutdown().await;
    info!("connections drained");

    Ok(())
}

/// Probe `GET /health` on a running server; used as a container health check.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = GatewayConfig::from_env();

    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen_addr.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    if config.presign_secret.is_empty() {
        warn!("S3LITE_PRESIGN_SECRET is not set; presigned URLs will not survive a restart");
        config.presign_secret = generate_secret();
    }

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen_addr))?;

    let signer = PresignSigner::new(&config.presign_secret, config.presign_clock_skew_secs);
    let http_config = S3HttpConfig::from(&config);
    info!(
        domain = %http_config.domain,
        virtual_hosting = http_config.virtual_hosting,
        request_timeout_secs = http_config.request_timeout.as_secs(),
        min_part_size = config.min_part_size,
        max_body_size = config.max_body_size,
        max_memory_object_size = config.max_memory_object_size,
        "initializing gateway",
    );

    let gateway = ObjectGateway::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = spawn_upload_reaper(gateway.clone(), shutdown_rx);
    let service = S3HttpService::new(GatewayHandler::new(gateway, signer), http_config);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, version = VERSION, "starting s3lite server");

    let served = serve(listener, service, shutdown_tx).await;

    if let Err(e) = reaper.await {
        warn!(error = %e, "upload reaper did not stop cleanly");
    }

    served
}
