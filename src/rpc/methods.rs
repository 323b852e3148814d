//! JSON-RPC method handlers.
//!
//! Implements the handlers for all supported JSON-RPC methods.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::VisualizerConfig;
use crate::error::DiffusionError;
use crate::generation::{make_rng, render_step};
use crate::imaging::write_png;

use super::server::ServerState;
use super::types::{
    JsonRpcError, LoadImageParams, LoadImageResult, NoiseParams, NoiseResult, ScheduleParams,
};

/// Handles a JSON-RPC method call.
pub fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "ping" => handle_ping(),
        "configure" => handle_configure(params, state),
        "load_image" => handle_load_image(params, state),
        "schedule" => handle_schedule(params, state),
        "noise" => handle_noise(params, state),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| DiffusionError::serialization_failed("result", e).into())
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &mut ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Handles the configure method. The configuration is replaced wholesale.
fn handle_configure(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let config: VisualizerConfig = parse_params(params)?;
    state.reconfigure(config)?;

    Ok(serde_json::json!({
        "status": "configured",
        "family": state.config.schedule.family.as_str(),
        "total_steps": state.scheduler.total_steps(),
        "blend": state.config.sampler.blend.as_str(),
        "image_size": state.config.image_size,
    }))
}

/// Handles the load_image method.
fn handle_load_image(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: LoadImageParams = parse_params(params)?;
    if params.path.trim().is_empty() {
        return Err(JsonRpcError::invalid_params("Image path cannot be empty"));
    }

    let size = params.size.unwrap_or(state.config.image_size);
    let grid = state.load_source(PathBuf::from(params.path), size)?;

    to_value(LoadImageResult {
        width: grid.width,
        height: grid.height,
    })
}

/// Handles the schedule method: one sample when `step` is given, else the table.
fn handle_schedule(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: ScheduleParams = if params.is_null() {
        ScheduleParams::default()
    } else {
        parse_params(params)?
    };

    match params.step {
        Some(step) => to_value(state.scheduler.sample(step)?),
        None => to_value(state.scheduler.table()?),
    }
}

/// Handles the noise method.
fn handle_noise(
    params: serde_json::Value,
    state: &mut ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: NoiseParams = parse_params(params)?;
    params.validate()?;

    let source = state.source.as_ref().ok_or_else(JsonRpcError::no_image_loaded)?;

    let seed = params
        .seed
        .or(state.config.seed)
        .unwrap_or_else(rand::random);
    let mut rng = make_rng(Some(seed));

    let frame = render_step(
        &state.scheduler,
        &state.sampler,
        source,
        params.step,
        state.config.terminal_pure_noise,
        &mut rng,
    )?;

    let output = PathBuf::from(&params.output);
    write_png(&frame.grid, &output)?;

    to_value(NoiseResult {
        path: output.to_string_lossy().to_string(),
        seed,
        terminal: state.config.terminal_pure_noise && state.scheduler.is_terminal(params.step),
        sample: frame.sample,
    })
}
