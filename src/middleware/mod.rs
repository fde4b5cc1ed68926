//! Middleware pipeline: the request/response exchange and the stage traits.
//!
//! A [`Chain`] is an ordered list of [`MiddlewareHandler`] stages ending
//! in a terminal [`HttpHandler`]. Each stage receives the exchange and a
//! [`Next`] pointing at the rest of the chain; calling [`Next::run`]
//! consumes it, so a stage can forward at most once. Disabled stages are
//! skipped at call time, which lets a config reload switch a stage off
//! without rebuilding the chain. The chain opens a fresh logging context
//! for each request unless its caller already runs inside one.

pub mod traceability;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Request, Response};

use crate::error::{BoxError, TraceabilityError};
use crate::mdc;
use crate::registry::ModuleRegistry;

/// One request/response pair as it travels through the chain.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request<Bytes>,
    pub response: Response<Bytes>,
}

impl Exchange {
    /// Wrap a request with an empty `200 OK` response.
    #[must_use]
    pub fn new(request: Request<Bytes>) -> Self {
        Self {
            request,
            response: Response::default(),
        }
    }

    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        self.response.headers_mut()
    }
}

// async_trait is required: stages are stored as Arc<dyn ...>.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError>;
}

#[async_trait]
pub trait MiddlewareHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    /// Publish this stage and its current config to the registry.
    fn register(&self, registry: &ModuleRegistry);

    /// Re-read config from its source and re-publish to the registry.
    async fn reload(&self, registry: &ModuleRegistry) -> Result<(), TraceabilityError>;

    async fn handle(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<(), BoxError>;
}

/// The remainder of a chain, as seen from inside a stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn MiddlewareHandler>],
    terminal: &'a dyn HttpHandler,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(stages: &'a [Arc<dyn MiddlewareHandler>], terminal: &'a dyn HttpHandler) -> Self {
        Self { stages, terminal }
    }

    /// Run the first enabled stage, or the terminal handler if none is left.
    pub async fn run(self, exchange: &mut Exchange) -> Result<(), BoxError> {
        let mut stages = self.stages;
        while let Some((stage, rest)) = stages.split_first() {
            if stage.is_enabled() {
                return stage.handle(exchange, Next::new(rest, self.terminal)).await;
            }
            tracing::trace!(stage = stage.name(), "stage disabled, skipping");
            stages = rest;
        }
        self.terminal.handle(exchange).await
    }
}

pub struct Chain {
    stages: Vec<Arc<dyn MiddlewareHandler>>,
    terminal: Arc<dyn HttpHandler>,
}

impl Chain {
    #[must_use]
    pub fn new(terminal: Arc<dyn HttpHandler>) -> Self {
        Self {
            stages: Vec::new(),
            terminal,
        }
    }

    /// Append a stage; stages run in the order they are added.
    #[must_use]
    pub fn with(mut self, stage: Arc<dyn MiddlewareHandler>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[Arc<dyn MiddlewareHandler>] {
        &self.stages
    }

    pub fn register_all(&self, registry: &ModuleRegistry) {
        for stage in &self.stages {
            stage.register(registry);
        }
    }
}

#[async_trait]
impl HttpHandler for Chain {
    /// Run the chain, opening a logging context first if the caller has none.
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
        let next = Next::new(&self.stages, &*self.terminal);
        if mdc::is_active() {
            next.run(exchange).await
        } else {
            mdc::scope(next.run(exchange)).await
        }
    }
}
