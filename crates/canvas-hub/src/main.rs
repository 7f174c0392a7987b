mod demo;
mod server;

use canvas_core::StateAggregator;
use clap::Parser;
use std::{
    fs::OpenOptions,
    io::{self, Write},
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{error, info};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

use crate::server::{build_router, HubState};

const DEFAULT_ADDR: &str = "127.0.0.1:7860";
const DEFAULT_LOG_DIR: &str = ".canvas/logs";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const LOG_FILE_NAME: &str = "canvas-hub.log";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: String,
    pub allow_remote: bool,
    pub debug: bool,
    pub demo: bool,
    pub poll_interval: Duration,
    pub write_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_dir: String,
}

#[derive(Parser, Debug)]
#[command(name = "canvas-hub")]
struct Args {
    #[arg(long, default_value = "")]
    addr: String,
    #[arg(long, default_value_t = false)]
    allow_remote: bool,
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value_t = false)]
    demo: bool,
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    #[arg(long, default_value_t = 2)]
    write_timeout: u64,
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
    #[arg(long, default_value = "")]
    log_dir: String,
}

#[tokio::main]
async fn main() {
    let config = load_config();
    let log_file = init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };
    if !addr.ip().is_loopback() && !config.allow_remote {
        error!(
            event = "invalid_addr",
            addr = %config.addr,
            reason = "non-loopback address requires --allow-remote"
        );
        return;
    }

    let canvas = Arc::new(StateAggregator::new());
    if config.demo {
        match demo::seed(&canvas) {
            Ok(count) => info!(event = "demo_seeded", reports = count, revision = canvas.revision()),
            Err(err) => error!(event = "demo_failed", error = %err),
        }
    }

    let hub = Arc::new(HubState::new(config.clone(), canvas));
    let app = build_router(hub);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err);
            return;
        }
    };

    let log_file = log_file
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(
        event = "hub_start",
        addr = %config.addr,
        demo = config.demo,
        log_file = %log_file
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "hub_error", error = %err);
    }
    info!(event = "hub_stop");
}

fn load_config() -> Config {
    let args = Args::parse();
    Config {
        addr: resolve_addr(&args.addr),
        allow_remote: args.allow_remote || env_true("CANVAS_ALLOW_REMOTE"),
        debug: args.debug || env_true("CANVAS_DEBUG"),
        demo: args.demo || env_true("CANVAS_DEMO"),
        poll_interval: Duration::from_millis(args.poll_interval_ms.max(50)),
        write_timeout: Duration::from_secs(args.write_timeout),
        max_body_bytes: args.max_body_bytes,
        log_dir: resolve_log_dir(&args.log_dir),
    }
}

type SharedLogFile = Arc<Mutex<std::fs::File>>;

/// Installs the global subscriber and returns the log file path when one is in use.
fn init_logging(config: &Config) -> Option<PathBuf> {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("CANVAS_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (log_path, file) = match open_log_file(&config.log_dir) {
        Ok(Some((path, file))) => (Some(path), Some(file)),
        Ok(None) => (None, None),
        Err(err) => {
            eprintln!("log_file_error: {err}");
            (None, None)
        }
    };
    let make_writer = BoxMakeWriter::new(move || TeeWriter::new(file.clone()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    log_path
}

/// Copies every log line to stdout and, when configured, the log file.
struct TeeWriter {
    stdout: io::Stdout,
    file: Option<SharedLogFile>,
}

impl TeeWriter {
    fn new(file: Option<SharedLogFile>) -> Self {
        Self {
            stdout: io::stdout(),
            file,
        }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.stdout.write_all(buf);
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stdout.flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// Opens `<log_dir>/canvas-hub.log` for appending. An empty dir disables the file.
fn open_log_file(log_dir: &str) -> io::Result<Option<(PathBuf, SharedLogFile)>> {
    if log_dir.trim().is_empty() {
        return Ok(None);
    }
    let dir = PathBuf::from(log_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok(Some((path, Arc::new(Mutex::new(file)))))
}

fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

fn resolve_addr(addr_flag: &str) -> String {
    if !addr_flag.trim().is_empty() {
        return addr_flag.to_string();
    }
    if let Ok(value) = std::env::var("CANVAS_ADDR") {
        if !value.trim().is_empty() {
            return value;
        }
    }
    DEFAULT_ADDR.to_string()
}

fn resolve_log_dir(log_dir_flag: &str) -> String {
    if !log_dir_flag.trim().is_empty() {
        return log_dir_flag.to_string();
    }
    if let Ok(value) = std::env::var("CANVAS_LOG_DIR") {
        return value;
    }
    DEFAULT_LOG_DIR.to_string()
}
