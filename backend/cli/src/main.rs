use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vigil_broker::{BrokerState, CaptureBroker, ConnectionRegistry, SessionRegistry};
use vigil_config::{Config, TransportKind};
use vigil_core::Metrics;
use vigil_gateway::{GatewayState, Shutdown};
use vigil_ocr::{OcrPipeline, TesseractEngine};
use vigil_tools::ActivityLog;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil — screen-share broker with OCR tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker
    Serve {
        /// Port for the HTTP listener
        #[arg(short, long)]
        port: Option<u16>,

        /// Transport kind: stdio or http
        #[arg(short, long)]
        transport: Option<String>,

        /// Path to a JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Query a running broker's health endpoint
    Status {
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run_cli(cli).await {
        Ok(code) => code,
        Err(e) => {
            // Startup failures can precede logger init.
            eprintln!("vigil: {e:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Serve {
            port,
            transport,
            config,
        } => {
            let mut config = vigil_config::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(transport) = transport {
                config.transport = transport
                    .parse::<TransportKind>()
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            init_logging(&config);
            run_server(config).await
        }
        Commands::Status { port } => status(port).await,
    }
}

/// In stdio mode stdout carries protocol frames, so logs go to stderr;
/// the HTTP server logs JSON lines the way the rest of the stack expects.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    match config.transport {
        TransportKind::Stdio => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .init();
        }
        TransportKind::Http => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
    }
}

async fn run_server(config: Config) -> Result<i32> {
    info!(
        transport = ?config.transport,
        port = config.port,
        "starting vigil"
    );

    let metrics = Arc::new(Metrics::new());
    let engine = Arc::new(TesseractEngine::new(config.tesseract_path.clone()));
    let pipeline = Arc::new(OcrPipeline::new(engine, config.ocr_languages.clone()));
    let capture = CaptureBroker::new();
    let activity_log = ActivityLog::new(config.activity_buffer_size);
    let registry = Arc::new(vigil_tools::default_registry(
        pipeline.clone(),
        capture.clone(),
        activity_log,
        Duration::from_millis(config.request_timeout_ms),
    ));

    let config = Arc::new(config);
    let gateway_state = GatewayState {
        tools: registry,
        metrics: metrics.clone(),
        config: config.clone(),
    };

    match config.transport {
        TransportKind::Stdio => {
            vigil_gateway::stdio::run(gateway_state).await?;
            Ok(0)
        }
        TransportKind::Http => {
            run_http(gateway_state, pipeline, capture, metrics, config).await
        }
    }
}

async fn run_http(
    gateway_state: GatewayState,
    pipeline: Arc<OcrPipeline>,
    capture: Arc<CaptureBroker>,
    metrics: Arc<Metrics>,
    config: Arc<Config>,
) -> Result<i32> {
    let broker_state = BrokerState {
        connections: ConnectionRegistry::new(),
        sessions: Arc::new(SessionRegistry::new()),
        pipeline,
        capture,
        metrics,
    };
    let sweeper = vigil_broker::spawn_sweeper(
        broker_state.clone(),
        Duration::from_millis(config.session_sweep_interval_ms),
    );

    let app = vigil_gateway::http::build_router(gateway_state)
        .merge(vigil_broker::router(broker_state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP listener ready");

    let shutdown = Shutdown::new();
    shutdown.install_signal_handlers();

    let serve = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.wait().await }
    });

    // Once draining starts the server may finish in-flight work, but only
    // until the configured deadline.
    let drain_deadline = {
        let shutdown = shutdown.clone();
        let budget = Duration::from_millis(config.shutdown_timeout_ms);
        async move {
            shutdown.wait().await;
            tokio::time::sleep(budget).await;
        }
    };

    let code = tokio::select! {
        result = serve => match result {
            Ok(()) => {
                info!("drained cleanly");
                0
            }
            Err(e) => {
                error!(error = %e, "server fault, shutting down");
                shutdown.trigger();
                1
            }
        },
        _ = drain_deadline => {
            error!("shutdown timeout exceeded, exiting non-gracefully");
            1
        }
    };

    sweeper.abort();
    Ok(code)
}

async fn status(port: u16) -> Result<i32> {
    let client = reqwest::Client::new();
    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
    {
        Ok(response) => {
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(0)
        }
        Err(_) => {
            println!("vigil is not running on port {port}");
            Ok(1)
        }
    }
}
