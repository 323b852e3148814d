//! JSON-RPC module for visualizer sessions.
//!
//! Provides the JSON-RPC 2.0 server implementation for:
//! - `ping`: Health check
//! - `configure`: Replace the session configuration
//! - `load_image`: Load and letterbox a source image
//! - `schedule`: Query one schedule sample or the whole table
//! - `noise`: Render a noised frame to PNG
//! - `shutdown`: Graceful shutdown

pub mod methods;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{run_server, ServerState};
pub use types::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcRequest, JsonRpcResponse, LoadImageParams,
    LoadImageResult, NoiseParams, NoiseResult, RequestId, ScheduleParams,
};
