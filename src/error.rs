//! Error types for ddpm-forward.
//!
//! Defines the error codes and the error type shared by the schedule engine,
//! the forward sampler and the image glue.

use std::fmt;

/// Error codes identifying the failure class.
///
/// These codes are mirrored in JSON-RPC error responses so clients can
/// handle specific conditions programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Schedule or sampler configuration is unusable.
    /// Trigger: total_steps <= 1, step out of range, bad family parameters.
    InvalidConfiguration,

    /// Pixel buffer length disagrees with its declared dimensions.
    /// Trigger: width * height * 4 != data.len().
    DimensionMismatch,

    /// A schedule value or signal fraction is NaN or infinite.
    /// Trigger: malformed configuration feeding sqrt/ln.
    NonFiniteValue,

    /// Source image could not be opened or decoded.
    ImageLoadFailed,

    /// Output image could not be encoded or written.
    ImageWriteFailed,

    /// A result could not be serialized to JSON.
    SerializationFailed,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfiguration => "INVALID_CONFIGURATION",
            ErrorCode::DimensionMismatch => "DIMENSION_MISMATCH",
            ErrorCode::NonFiniteValue => "NON_FINITE_VALUE",
            ErrorCode::ImageLoadFailed => "IMAGE_LOAD_FAILED",
            ErrorCode::ImageWriteFailed => "IMAGE_WRITE_FAILED",
            ErrorCode::SerializationFailed => "SERIALIZATION_FAILED",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfiguration => "Schedule or sampler configuration is invalid",
            ErrorCode::DimensionMismatch => "Pixel buffer does not match its declared dimensions",
            ErrorCode::NonFiniteValue => "A numeric value became NaN or infinite",
            ErrorCode::ImageLoadFailed => "Failed to open or decode the source image",
            ErrorCode::ImageWriteFailed => "Failed to encode or write the output image",
            ErrorCode::SerializationFailed => "Failed to serialize a result to JSON",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidConfiguration => {
                "Use at least 2 total steps, request a step in [0, total_steps - 1], \
                 and keep max_beta in [0, 1) and clip bounds inside [0, 1]"
            }
            ErrorCode::DimensionMismatch => {
                "Supply exactly width * height * 4 RGBA bytes for the pixel grid"
            }
            ErrorCode::NonFiniteValue => {
                "Check the schedule parameters; cumulative alpha must be a finite value in [0, 1]"
            }
            ErrorCode::ImageLoadFailed => {
                "Verify the path exists and points to a PNG, JPEG or other supported image"
            }
            ErrorCode::ImageWriteFailed => {
                "Check that the output directory exists and is writable"
            }
            ErrorCode::SerializationFailed => "Check that every schedule value is finite",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for diffusion operations.
#[derive(Debug)]
pub struct DiffusionError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DiffusionError {
    /// Creates a new DiffusionError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new DiffusionError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_CONFIGURATION error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, reason)
    }

    /// Creates an INVALID_CONFIGURATION error for an out-of-range step.
    pub fn step_out_of_range(step: u32, total_steps: u32) -> Self {
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!(
                "Step {} is out of range (must be between 0 and {})",
                step,
                total_steps.saturating_sub(1)
            ),
        )
    }

    /// Creates a DIMENSION_MISMATCH error.
    pub fn dimension_mismatch(width: u32, height: u32, len: usize) -> Self {
        Self::new(
            ErrorCode::DimensionMismatch,
            format!(
                "Grid declared as {}x{} needs {} bytes, buffer has {}",
                width,
                height,
                width as u128 * height as u128 * 4,
                len
            ),
        )
    }

    /// Creates a NON_FINITE_VALUE error.
    pub fn non_finite(what: &str, value: f64) -> Self {
        Self::new(
            ErrorCode::NonFiniteValue,
            format!("{} is not finite: {}", what, value),
        )
    }

    /// Creates an IMAGE_LOAD_FAILED error.
    pub fn image_load_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(
            ErrorCode::ImageLoadFailed,
            format!("Failed to load image: {}", path.into()),
            source,
        )
    }

    /// Creates an IMAGE_WRITE_FAILED error.
    pub fn image_write_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ImageWriteFailed,
            format!("Failed to write image: {}", reason.into()),
        )
    }

    /// Creates a SERIALIZATION_FAILED error.
    pub fn serialization_failed(
        what: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(
            ErrorCode::SerializationFailed,
            format!("Failed to serialize {}", what),
            source,
        )
    }
}

impl fmt::Display for DiffusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for DiffusionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using DiffusionError.
pub type Result<T> = std::result::Result<T, DiffusionError>;
