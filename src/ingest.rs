//! Module for the http endpoint that receives sensor data from the devices.
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::Value;

use crate::log_writer::{LogWriterError, RotatingLogWriter};
use crate::record::{Record, RecordError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No data found")]
    EmptyPayload,
    #[error("request body is not a json object with a string 'data' field")]
    MalformedBody,
    #[error("payload contains a line break")]
    LineBreak,
    #[error(transparent)]
    Storage(#[from] LogWriterError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl IngestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::EmptyPayload => StatusCode::BAD_REQUEST,
            IngestError::MalformedBody => StatusCode::BAD_REQUEST,
            IngestError::LineBreak => StatusCode::BAD_REQUEST,
            IngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IngestError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short text returned to the device.
    pub fn body(&self) -> &'static str {
        match self {
            IngestError::EmptyPayload | IngestError::MalformedBody | IngestError::LineBreak => {
                "No data found"
            }
            IngestError::Storage(_) | IngestError::Unexpected(_) => "Server error",
        }
    }
}

impl From<RecordError> for IngestError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Empty => IngestError::EmptyPayload,
            RecordError::LineBreak => IngestError::LineBreak,
        }
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!(target: "sensorlogd::http", "Request failed: \'{}\'", self);
        } else {
            log::warn!(target: "sensorlogd::http", "Rejected request: \'{}\'", self);
        }
        (status, self.body()).into_response()
    }
}

/// Extracts the `data` field of a request body.
///
/// A missing field counts as an empty payload.
fn extract_data(body: &[u8]) -> Result<String, IngestError> {
    let json = serde_json::from_slice::<Value>(body).map_err(|_| IngestError::MalformedBody)?;
    let object = json.as_object().ok_or(IngestError::MalformedBody)?;

    match object.get("data") {
        None => Ok(String::new()),
        Some(Value::String(data)) => Ok(data.clone()),
        Some(_) => Err(IngestError::MalformedBody),
    }
}

/// Validates a request body, stamps it with the receipt time and appends it to the data log.
///
/// # Returns
///
/// * `Ok(path)` - The log file the record was appended to.
///
/// * `Err(...)` - The body was rejected or the record could not be written. Nothing is written
///     for a rejected body.
pub fn submit(writer: &RotatingLogWriter, body: &[u8]) -> Result<PathBuf, IngestError> {
    let data = extract_data(body)?;
    let record = Record::new(writer.now(), &data)?;

    let path = writer.append(&record)?;
    log::info!(target: "sensorlogd::http", "Received: \'{}\'", record);
    Ok(path)
}

async fn receive_data(State(writer): State<Arc<RotatingLogWriter>>, body: Bytes) -> Response {
    let result = tokio::task::spawn_blocking(move || submit(&writer, &body)).await;

    match result {
        Ok(Ok(_)) => (StatusCode::OK, "Data received").into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(err) => IngestError::Unexpected(err.to_string()).into_response(),
    }
}

/// Router exposing `POST /data`.
pub fn router(writer: Arc<RotatingLogWriter>) -> Router {
    Router::new()
        .route("/data", post(receive_data))
        .with_state(writer)
}
