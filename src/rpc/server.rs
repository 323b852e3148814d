//! JSON-RPC server over stdin/stdout.
//!
//! Implements the JSON-RPC 2.0 protocol for visualizer sessions.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::VisualizerConfig;
use crate::error::Result;
use crate::imaging::load_letterboxed;
use crate::sampler::{ForwardSampler, PixelGrid};
use crate::schedule::NoiseScheduler;

use super::methods::handle_request;
use super::types::{JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse};

/// State shared across all request handlers.
pub struct ServerState {
    /// Active configuration.
    pub config: VisualizerConfig,
    /// Scheduler built from `config.schedule`.
    pub scheduler: NoiseScheduler,
    /// Sampler built from `config.sampler`.
    pub sampler: ForwardSampler,
    /// Letterboxed source image, once loaded.
    pub source: Option<PixelGrid>,
    /// Path the source was loaded from.
    pub source_path: Option<PathBuf>,
    /// Flag to signal server shutdown.
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates new server state from a validated configuration.
    pub fn new(config: VisualizerConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = NoiseScheduler::new(config.schedule)?;
        let sampler = ForwardSampler::new(config.sampler);

        Ok(Self {
            config,
            scheduler,
            sampler,
            source: None,
            source_path: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the whole configuration.
    ///
    /// On error the previous configuration stays active. A loaded source is
    /// re-letterboxed when the canvas size changes.
    pub fn reconfigure(&mut self, config: VisualizerConfig) -> Result<()> {
        config.validate()?;
        let scheduler = NoiseScheduler::new(config.schedule)?;

        // The source may have been loaded at a size other than the configured one.
        let resized = self
            .source
            .as_ref()
            .map_or(false, |grid| grid.width != config.image_size);
        let reloaded = match &self.source_path {
            Some(path) if resized => Some(load_letterboxed(path, config.image_size)?),
            _ => None,
        };

        if let Some(grid) = reloaded {
            self.source = Some(grid);
        }
        self.sampler = ForwardSampler::new(config.sampler);
        self.scheduler = scheduler;
        self.config = config;
        Ok(())
    }

    /// Loads and letterboxes a new source image.
    pub fn load_source(&mut self, path: PathBuf, size: u32) -> Result<&PixelGrid> {
        let grid = load_letterboxed(&path, size)?;
        self.source_path = Some(path);
        Ok(self.source.insert(grid))
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
pub fn run_server(mut state: ServerState) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let reader = stdin.lock();

    eprintln!("JSON-RPC server started, waiting for requests...");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading stdin: {}", e);
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = process_request(&line, &mut state);

        if let Some(response) = response {
            writeln!(stdout, "{}", response).ok();
            stdout.flush().ok();
        }

        if state.is_shutdown() {
            eprintln!("Server shutdown requested");
            break;
        }
    }

    eprintln!("JSON-RPC server stopped");
    Ok(())
}

/// Processes a single JSON-RPC request line.
fn process_request(line: &str, state: &mut ServerState) -> Option<String> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcErrorResponse::new(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return Some(serde_json::to_string(&error).unwrap_or_default());
        }
    };

    if request.jsonrpc != "2.0" {
        let error = JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
        return Some(serde_json::to_string(&error).unwrap_or_default());
    }

    debug!(method = %request.method, "handling request");

    match handle_request(&request.method, request.params, state) {
        Ok(result) => Some(
            serde_json::to_string(&JsonRpcResponse::new(request.id, result)).unwrap_or_default(),
        ),
        Err(error) => Some(
            serde_json::to_string(&JsonRpcErrorResponse::new(Some(request.id), error))
                .unwrap_or_default(),
        ),
    }
}
