//! JSON-RPC types for the visualizer protocol.

use serde::{Deserialize, Serialize};

use crate::error::{DiffusionError, ErrorCode};
use crate::schedule::ScheduleSample;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a no image loaded error (-32005).
    pub fn no_image_loaded() -> Self {
        Self {
            code: -32005,
            message: "No image loaded".to_string(),
            data: Some(JsonRpcErrorData {
                error_code: "NO_IMAGE_LOADED".to_string(),
                details: Some("Call load_image before requesting noise".to_string()),
            }),
        }
    }

    /// Returns the application code for a library error code.
    pub fn app_code(code: ErrorCode) -> i32 {
        match code {
            ErrorCode::InvalidConfiguration => -32000,
            ErrorCode::DimensionMismatch => -32001,
            ErrorCode::NonFiniteValue => -32002,
            ErrorCode::ImageLoadFailed => -32003,
            ErrorCode::ImageWriteFailed => -32004,
            ErrorCode::SerializationFailed => -32006,
        }
    }
}

impl From<DiffusionError> for JsonRpcError {
    fn from(err: DiffusionError) -> Self {
        Self {
            code: Self::app_code(err.code),
            message: err.code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: err.code.as_str().to_string(),
                details: Some(err.message),
            }),
        }
    }
}

// ============================================================================
// Method parameters and results
// ============================================================================

/// Parameters for a load_image request.
#[derive(Debug, Deserialize)]
pub struct LoadImageParams {
    /// Path to the source image.
    pub path: String,

    /// Canvas edge length; defaults to the configured image size.
    #[serde(default)]
    pub size: Option<u32>,
}

/// Response for a load_image request.
#[derive(Debug, Serialize)]
pub struct LoadImageResult {
    pub width: u32,
    pub height: u32,
}

/// Parameters for a schedule request.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleParams {
    /// Single step to query; the whole table when absent.
    #[serde(default)]
    pub step: Option<u32>,
}

/// Parameters for a noise request.
#[derive(Debug, Deserialize)]
pub struct NoiseParams {
    /// Diffusion step to render.
    pub step: u32,

    /// Random seed; falls back to the configured seed, then a random one.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Output PNG path.
    pub output: String,
}

impl NoiseParams {
    /// Validates the request parameters.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.output.trim().is_empty() {
            return Err(JsonRpcError::invalid_params("Output path cannot be empty"));
        }
        Ok(())
    }
}

/// Response for a noise request.
#[derive(Debug, Serialize)]
pub struct NoiseResult {
    /// Path of the written PNG.
    pub path: String,

    /// Seed used for the noise.
    pub seed: u64,

    /// True if the frame is uniform pure noise.
    pub terminal: bool,

    /// Schedule values for the step.
    pub sample: ScheduleSample,
}
