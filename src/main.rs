//! Admission gate binary.
//!
//! Reads one request per line from stdin, `IP METHOD PATH [TOKEN]`, and
//! writes one JSON verdict per line to stdout. The configuration path is the
//! first argument, or `ADMISSION_GATE_CONFIG`, or `admission-gate.toml`.

use admission_gate::config::{BasicValidator, ComponentValidator, ConfigLoader};
use admission_gate::module::{ModuleConfig, ModuleContract};
use admission_gate::modules::gateway::{AdmissionRequest, GatewayHandler, Verdict};
use admission_gate::store::{Adapters, Cache, GateStore, MemoryCache, MemoryStore, NoopCache};
use admission_gate::telemetry;
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "admission-gate.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ADMISSION_GATE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(ComponentValidator::new())
        .load_or_default(&path)
        .with_context(|| format!("loading configuration from {path}"))?;

    telemetry::init_tracing(&config.logging);
    info!(name = %config.gate.name, version = env!("CARGO_PKG_VERSION"), "Starting admission gate");

    let cache: Arc<dyn Cache> = if config.gate.cache_enabled {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(NoopCache)
    };
    let store: Arc<dyn GateStore> = Arc::new(MemoryStore::new());
    let adapters = Adapters::new(store, cache, config.timeouts());

    let mut gate = GatewayHandler::new(adapters);
    gate.init(ModuleConfig::from_typed(&config.gateway())?)
        .context("initializing admission gate")?;
    gate.start().context("starting admission gate")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(request) = parse_request(&line) else {
            if !line.trim().is_empty() {
                warn!(line = %line, "Expected `IP METHOD PATH [TOKEN]`");
            }
            continue;
        };

        let verdict = gate.evaluate(&request).await;
        let mut out = render(&request, &verdict).to_string();
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
    }
    stdout.flush().await?;

    eprint!("{}", gate.metrics().to_prometheus("admission_gate"));
    gate.stop()?;
    Ok(())
}

fn parse_request(line: &str) -> Option<AdmissionRequest> {
    let mut parts = line.split_whitespace();
    let ip = parts.next()?;
    let method = parts.next()?;
    let path = parts.next()?;

    let request = AdmissionRequest::new(ip, method, path);
    Some(match parts.next() {
        Some(token) => request.with_header("authorization", format!("Bearer {token}")),
        None => request,
    })
}

fn render(request: &AdmissionRequest, verdict: &Verdict) -> serde_json::Value {
    json!({
        "ip": request.client_ip,
        "method": request.method,
        "path": request.path,
        "allowed": verdict.is_allowed(),
        "status": verdict.status_code(),
        "reason": verdict.reason.map(|r| r.code()),
        "message": verdict.reason.map(|r| r.user_message()),
        "uid": verdict.identity().map(|i| i.id),
        "retry_after_secs": verdict.retry_after.map(|d| d.as_secs()),
        "clear_cookie": verdict.clear_cookie,
    })
}
