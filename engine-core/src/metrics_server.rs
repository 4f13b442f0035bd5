//! HTTP server exposing `/metrics` for Prometheus scraping and `/health`
//! for liveness checks (spec §4.0's ambient observability surface).

use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::metrics::MetricsRegistry;

#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self { listen_addr: "127.0.0.1:9090".parse().unwrap(), metrics_path: "/metrics".to_string() }
    }
}

pub struct MetricsServer {
    config: MetricsServerConfig,
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: Arc<MetricsRegistry>) -> Self {
        Self { config, registry }
    }

    /// Runs indefinitely; spawn this in its own tokio task.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await.context("failed to bind metrics server")?;

        info!("metrics server listening on http://{}{}", self.config.listen_addr, self.config.metrics_path);

        let registry = self.registry.clone();
        let metrics_path = self.config.metrics_path.clone();

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("failed to accept metrics connection: {}", e);
                    continue;
                }
            };

            let registry = registry.clone();
            let metrics_path = metrics_path.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let registry = registry.clone();
                    let metrics_path = metrics_path.clone();
                    async move { handle_request(req, registry, metrics_path).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("metrics connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }

    pub fn render_metrics(&self) -> Result<String> {
        encode_metrics(&self.registry)
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    registry: Arc<MetricsRegistry>,
    metrics_path: String,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path();
    debug!("metrics request: {} {}", req.method(), path);

    if path == "/health" || path == "/healthz" {
        return Ok(Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from("OK"))).unwrap());
    }

    if path == metrics_path {
        return match encode_metrics(&registry) {
            Ok(text) => Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(text)))
                .unwrap()),
            Err(e) => {
                error!("failed to encode metrics: {}", e);
                Ok(Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::from(format!("error: {e}"))))
                    .unwrap())
            }
        };
    }

    if path == "/" {
        let help = format!("engine metrics\n\nendpoints:\n  {metrics_path} - Prometheus metrics\n  /health - liveness check\n");
        return Ok(Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from(help))).unwrap());
    }

    warn!("unknown metrics endpoint requested: {}", path);
    Ok(Response::builder().status(StatusCode::NOT_FOUND).body(Full::new(Bytes::from("Not Found"))).unwrap())
}

fn encode_metrics(registry: &MetricsRegistry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.registry().gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).context("failed to encode metrics")?;

    String::from_utf8(buffer).context("invalid utf-8 in metrics")
}
