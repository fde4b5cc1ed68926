//! Terminal handler of the demo pipeline.
//!
//! Answers every request with a JSON description of what it saw,
//! including the `tId` present in the logging context while it ran.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::mdc;
use crate::middleware::traceability::TID;
use crate::middleware::{Exchange, HttpHandler};

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoResponse {
    pub method: String,
    pub path: String,
    #[serde(rename = "tId")]
    pub tid: Option<String>,
    pub body_bytes: usize,
}

pub struct EchoHandler;

#[async_trait]
impl HttpHandler for EchoHandler {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
        let echo = EchoResponse {
            method: exchange.request.method().to_string(),
            path: exchange.request.uri().path().to_string(),
            tid: mdc::get(TID),
            body_bytes: exchange.request.body().len(),
        };
        tracing::info!(method = %echo.method, path = %echo.path, "request handled");

        let body = serde_json::to_vec(&echo)?;
        exchange.response_headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        *exchange.response.body_mut() = Bytes::from(body);
        Ok(())
    }
}
