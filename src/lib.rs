//! Traceability id propagation for HTTP middleware pipelines.
//!
//! A caller-supplied `X-Traceability-Id` header is echoed on the
//! response and exposed to logging as `tId` for the duration of the
//! request, so every log record emitted while handling one logical
//! request can be tied together. Requests without the header never see
//! a `tId` left behind by an earlier request.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Configuration loading and hot-reloading via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`echo`] -- Terminal handler that reports what it observed.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`mdc`] -- Task-local logging context.
//! - [`middleware`] -- Exchange, stage traits, chain, and the
//!   [`TraceabilityHandler`](middleware::traceability::TraceabilityHandler).
//! - [`registry`] -- Module registry for operational introspection.
//! - [`server`] -- Axum server setup, shared application state, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod echo;
pub mod error;
pub mod health;
pub mod logging;
pub mod mdc;
pub mod middleware;
pub mod registry;
pub mod server;
