use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper::config::{GatekeeperConfig, StorageBackend};
use gatekeeper::ratelimit::{
    CounterStore, Engine, MemoryCounterStore, Policy, RedisCounterStore, RequestInfo,
};

/// Request admission filter: safelists, blocklists and fixed-window throttling.
#[derive(Debug, Parser)]
#[command(name = "gatekeeper", version, about)]
struct Cli {
    /// YAML configuration file; `GATEKEEPER__*` variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and print a summary
    Check,
    /// Evaluate a request against the configured policy and counter store
    Decide {
        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Transport remote address (`host:port`)
        #[arg(long)]
        remote_addr: String,

        /// X-Forwarded-For header value
        #[arg(long)]
        forwarded_for: Option<String>,

        /// Number of times to send the request
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GatekeeperConfig::load(cli.config.as_deref())?;
    let policy = Arc::new(config.build_policy()?);
    info!(backend = ?config.storage.backend, "Configuration loaded");

    match cli.command {
        Command::Check => {
            print_summary(&policy);
            Ok(())
        }
        Command::Decide {
            method,
            path,
            remote_addr,
            forwarded_for,
            repeat,
        } => {
            let mut request = RequestInfo::new(method, path, remote_addr);
            request.forwarded_for = forwarded_for;

            match config.storage.backend {
                StorageBackend::Memory => {
                    let store = Arc::new(MemoryCounterStore::new());
                    run_decisions(build_engine(&config, policy, store), &request, repeat).await
                }
                StorageBackend::Redis => {
                    let store = Arc::new(RedisCounterStore::connect(&config.storage.redis_url).await?);
                    run_decisions(build_engine(&config, policy, store), &request, repeat).await
                }
            }
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn build_engine<S: CounterStore>(
    config: &GatekeeperConfig,
    policy: Arc<Policy>,
    store: Arc<S>,
) -> Engine<S> {
    Engine::new(policy, store)
        .with_identity_source(config.identity.extractor())
        .with_storage_timeout(config.storage.timeout())
}

fn print_summary(policy: &Policy) {
    let summary = json!({
        "safelist": policy.access().safelist_len(),
        "blocklist": policy.access().blocklist_len(),
        "blocklist_cidrs": policy.access().blocklist_range_len(),
        "rules": policy.rules().len(),
    });
    println!("{}", summary);
}

async fn run_decisions<S: CounterStore>(
    engine: Engine<S>,
    request: &RequestInfo,
    repeat: u32,
) -> anyhow::Result<()> {
    for attempt in 1..=repeat {
        let line = match engine.decide(request).await {
            Ok(decision) => json!({
                "attempt": attempt,
                "throttled": decision.is_throttled(),
                "decision": decision.to_string(),
            }),
            // Storage failures are reported, not turned into a verdict.
            Err(e) => json!({
                "attempt": attempt,
                "throttled": false,
                "error": e.to_string(),
            }),
        };
        println!("{}", line);
    }
    Ok(())
}
