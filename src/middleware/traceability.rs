//! Traceability id propagation.
//!
//! [`TraceabilityHandler`] reads the `X-Traceability-Id` request header.
//! When present, the value is echoed verbatim on the response and placed
//! in the logging context under [`TID`] for as long as the rest of the
//! chain runs; downstream log records also carry it through the
//! `traceability` span. When absent, any `tId` left in the logging
//! context is cleared before the chain continues.

use std::any::type_name;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderName;
use tracing::Instrument;

use super::{Exchange, MiddlewareHandler, Next};
use crate::config::model::CONFIG_NAME;
use crate::config::{ConfigHandle, ConfigResolver, LoadedConfig};
use crate::error::{BoxError, TraceabilityError};
use crate::mdc;
use crate::registry::ModuleRegistry;

pub const TRACEABILITY_ID: HeaderName = HeaderName::from_static("x-traceability-id");

/// Logging-context key holding the current traceability id.
pub const TID: &str = "tId";

pub struct TraceabilityHandler {
    config: ConfigHandle,
    resolver: ConfigResolver,
}

impl TraceabilityHandler {
    /// Load the initial config from `resolver` and build the handler.
    pub async fn load(resolver: ConfigResolver) -> Result<Self, TraceabilityError> {
        let (config, version) = resolver.load_with_fallback().await?;
        let loaded = LoadedConfig::new(config, version, resolver.primary_name());
        Ok(Self::with_config(resolver, loaded))
    }

    #[must_use]
    pub fn with_config(resolver: ConfigResolver, loaded: LoadedConfig) -> Self {
        Self {
            config: ConfigHandle::new(loaded),
            resolver,
        }
    }

    /// Current config snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<LoadedConfig> {
        self.config.current()
    }

    /// Reload only if the primary source reports a change.
    pub async fn reload_if_changed(
        &self,
        registry: &ModuleRegistry,
    ) -> Result<bool, TraceabilityError> {
        let current = self.config.current();
        if !self.resolver.primary().has_changed(&current.version).await? {
            return Ok(false);
        }
        tracing::info!("config change detected, reloading");
        self.reload(registry).await?;
        Ok(true)
    }

    fn publish(&self, registry: &ModuleRegistry) {
        let current = self.config.current();
        registry.register_module(CONFIG_NAME, type_name::<Self>(), current.config.mapped(), None);
    }
}

#[async_trait]
impl MiddlewareHandler for TraceabilityHandler {
    fn name(&self) -> &'static str {
        CONFIG_NAME
    }

    fn is_enabled(&self) -> bool {
        self.config.current().config.enabled
    }

    fn register(&self, registry: &ModuleRegistry) {
        self.publish(registry);
    }

    async fn reload(&self, registry: &ModuleRegistry) -> Result<(), TraceabilityError> {
        let (config, version) = self.resolver.load_with_fallback().await?;
        let enabled = config.enabled;
        self.config.replace(LoadedConfig::new(
            config,
            version,
            self.resolver.primary_name(),
        ));
        self.publish(registry);
        tracing::info!(enabled, "traceability handler reloaded");
        Ok(())
    }

    async fn handle(&self, exchange: &mut Exchange, next: Next<'_>) -> Result<(), BoxError> {
        tracing::trace!("traceability handler starts");

        // ERROR level: the span must stay enabled under any filter that lets events through.
        let (span, _entry) = match exchange.request_headers().get(&TRACEABILITY_ID).cloned() {
            Some(value) => {
                let tid = String::from_utf8_lossy(value.as_bytes()).into_owned();
                exchange.response_headers_mut().insert(TRACEABILITY_ID, value);
                let span = tracing::error_span!("traceability", tId = tid.as_str());
                (span, Some(mdc::put_scoped(TID, tid)))
            }
            None => {
                mdc::remove(TID);
                (tracing::error_span!("traceability"), None)
            }
        };

        tracing::trace!("traceability handler ends");
        next.run(exchange).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::body::Bytes;
    use axum::http::{HeaderValue, Request};
    use tracing::Level;

    use super::*;
    use crate::config::model::TraceabilityConfig;
    use crate::config::sources::DefaultSource;
    use crate::config::ConfigVersion;
    use crate::logging::capture;
    use crate::middleware::{Chain, HttpHandler};

    /// Records what the downstream stage observed.
    #[derive(Default)]
    struct Probe {
        calls: AtomicUsize,
        seen_tid: Mutex<Vec<Option<String>>>,
        seen_response_header: Mutex<Vec<Option<HeaderValue>>>,
        fail_with: Option<&'static str>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("downstream failed: {0}")]
    struct DownstreamError(&'static str);

    #[async_trait]
    impl HttpHandler for Probe {
        async fn handle(&self, exchange: &mut Exchange) -> Result<(), BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_tid.lock().unwrap().push(mdc::get(TID));
            self.seen_response_header
                .lock()
                .unwrap()
                .push(exchange.response.headers().get(&TRACEABILITY_ID).cloned());
            match self.fail_with {
                Some(msg) => Err(Box::new(DownstreamError(msg))),
                None => Ok(()),
            }
        }
    }

    /// Terminal that only logs a warning.
    struct Warns;

    #[async_trait]
    impl HttpHandler for Warns {
        async fn handle(&self, _exchange: &mut Exchange) -> Result<(), BoxError> {
            tracing::warn!("downstream warning");
            Ok(())
        }
    }

    fn handler(enabled: bool) -> Arc<TraceabilityHandler> {
        Arc::new(TraceabilityHandler::with_config(
            ConfigResolver::new(Box::new(DefaultSource), None),
            LoadedConfig::new(
                TraceabilityConfig { enabled },
                ConfigVersion::Hash("test".into()),
                "test",
            ),
        ))
    }

    fn exchange_with(value: Option<HeaderValue>) -> Exchange {
        let mut builder = Request::builder().uri("/orders");
        if let Some(value) = value {
            builder = builder.header("X-Traceability-Id", value);
        }
        Exchange::new(builder.body(Bytes::new()).unwrap())
    }

    fn exchange(tid: Option<&str>) -> Exchange {
        exchange_with(tid.map(|t| HeaderValue::from_str(t).unwrap()))
    }

    #[tokio::test]
    async fn present_header_is_echoed_and_visible_downstream() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        let mut ex = exchange(Some("abc-123"));
        mdc::scope(chain.handle(&mut ex)).await.unwrap();

        assert_eq!(ex.response.headers().get(&TRACEABILITY_ID).unwrap(), "abc-123");
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![Some("abc-123".to_string())]);
        // Response header is already set when the next stage runs.
        assert_eq!(
            probe.seen_response_header.lock().unwrap()[0].as_ref().unwrap(),
            "abc-123"
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_header_value_is_propagated() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        let mut ex = exchange(Some(""));
        mdc::scope(chain.handle(&mut ex)).await.unwrap();

        assert_eq!(ex.response.headers().get(&TRACEABILITY_ID).unwrap(), "");
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![Some(String::new())]);
    }

    #[tokio::test]
    async fn header_lookup_is_case_insensitive_and_takes_first() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        let request = Request::builder()
            .header("x-TRACEABILITY-id", "first")
            .header("X-Traceability-Id", "second")
            .body(Bytes::new())
            .unwrap();
        let mut ex = Exchange::new(request);
        mdc::scope(chain.handle(&mut ex)).await.unwrap();

        let echoed: Vec<_> = ex.response.headers().get_all(&TRACEABILITY_ID).iter().collect();
        assert_eq!(echoed, vec!["first"]);
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![Some("first".to_string())]);
    }

    #[tokio::test]
    async fn value_is_copied_byte_for_byte() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe).with(handler(true));

        let raw: &[u8] = b"id \xe9 with obs-text";
        let mut ex = exchange_with(Some(HeaderValue::from_bytes(raw).unwrap()));
        mdc::scope(chain.handle(&mut ex)).await.unwrap();

        assert_eq!(ex.response.headers().get(&TRACEABILITY_ID).unwrap().as_bytes(), raw);
    }

    #[tokio::test]
    async fn absent_header_adds_nothing_and_clears_stale_id() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        let mut ex = exchange(None);
        mdc::scope(async {
            // Simulate state left on a reused execution unit.
            mdc::put(TID, "stale");
            chain.handle(&mut ex).await
        })
        .await
        .unwrap();

        assert!(ex.response.headers().get(&TRACEABILITY_ID).is_none());
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![None]);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn id_does_not_leak_into_next_request_on_same_task() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        mdc::scope(async {
            chain.handle(&mut exchange(Some("req-1"))).await.unwrap();
            assert_eq!(mdc::get(TID), None);
            chain.handle(&mut exchange(None)).await.unwrap();
        })
        .await;

        assert_eq!(
            *probe.seen_tid.lock().unwrap(),
            vec![Some("req-1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn downstream_error_propagates_unchanged_and_context_is_released() {
        let probe = Arc::new(Probe {
            fail_with: Some("boom"),
            ..Probe::default()
        });
        let chain = Chain::new(probe.clone()).with(handler(true));

        let err = mdc::scope(async {
            let err = chain.handle(&mut exchange(Some("abc"))).await.unwrap_err();
            assert_eq!(mdc::get(TID), None);
            err
        })
        .await;

        let downstream = err.downcast_ref::<DownstreamError>().unwrap();
        assert_eq!(downstream.0, "boom");
        assert_eq!(err.to_string(), "downstream failed: boom");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_handler_is_skipped_by_chain() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(false));

        let mut ex = exchange(Some("abc-123"));
        mdc::scope(chain.handle(&mut ex)).await.unwrap();

        assert!(ex.response.headers().get(&TRACEABILITY_ID).is_none());
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![None]);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_see_their_own_id() {
        let probe = Arc::new(Probe::default());
        let chain = Arc::new(Chain::new(probe.clone()).with(handler(true)));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let chain = Arc::clone(&chain);
                tokio::spawn(mdc::scope(async move {
                    let id = format!("req-{i}");
                    let mut ex = exchange(Some(id.as_str()));
                    chain.handle(&mut ex).await.unwrap();
                    (id, ex.response.headers().get(&TRACEABILITY_ID).cloned())
                }))
            })
            .collect();

        for task in tasks {
            let (id, echoed) = task.await.unwrap();
            assert_eq!(echoed.unwrap(), id.as_str());
        }

        let mut seen: Vec<_> = probe.seen_tid.lock().unwrap().iter().flatten().cloned().collect();
        seen.sort();
        let mut expected: Vec<_> = (0..16).map(|i| format!("req-{i}")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn register_publishes_name_class_and_config() {
        let registry = ModuleRegistry::new();
        handler(true).register(&registry);

        let info = registry.get(CONFIG_NAME).unwrap();
        assert!(info.class.ends_with("TraceabilityHandler"));
        assert_eq!(info.config, serde_json::json!({ "enabled": true }));
        assert!(info.masks.is_none());
    }

    #[tokio::test]
    async fn reload_replaces_config_and_republishes() {
        let registry = ModuleRegistry::new();
        let handler = handler(false);
        handler.register(&registry);
        assert!(!handler.is_enabled());

        // DefaultSource yields enabled = true.
        handler.reload(&registry).await.unwrap();

        assert!(handler.is_enabled());
        assert_eq!(handler.config().version, ConfigVersion::Default);
        assert_eq!(
            registry.get(CONFIG_NAME).unwrap().config,
            serde_json::json!({ "enabled": true })
        );
    }

    #[tokio::test]
    async fn reload_if_changed_skips_unchanged_source() {
        let registry = ModuleRegistry::new();
        let handler = handler(false);

        // Hash("test") differs from the default version, so the first check reloads.
        assert!(handler.reload_if_changed(&registry).await.unwrap());
        assert!(!handler.reload_if_changed(&registry).await.unwrap());
        assert!(handler.is_enabled());
    }

    #[tokio::test]
    async fn chain_without_caller_scope_still_exposes_id_downstream() {
        let probe = Arc::new(Probe::default());
        let chain = Chain::new(probe.clone()).with(handler(true));

        let mut ex = exchange(Some("abc-123"));
        chain.handle(&mut ex).await.unwrap();

        assert_eq!(ex.response.headers().get(&TRACEABILITY_ID).unwrap(), "abc-123");
        assert_eq!(*probe.seen_tid.lock().unwrap(), vec![Some("abc-123".to_string())]);
        assert!(!mdc::is_active());
    }

    #[tokio::test]
    async fn downstream_warnings_are_tagged_under_warn_filter() {
        let (_guard, logs) = capture::json_at(Level::WARN);
        let chain = Chain::new(Arc::new(Warns)).with(handler(true));

        chain.handle(&mut exchange(Some("abc-123"))).await.unwrap();

        let logs = logs.contents();
        assert!(logs.contains("downstream warning"), "{logs}");
        assert!(logs.contains(r#""tId":"abc-123""#), "{logs}");
    }

    #[tokio::test]
    async fn downstream_records_have_no_tid_without_header() {
        let (_guard, logs) = capture::json_at(Level::INFO);
        let chain = Chain::new(Arc::new(Warns)).with(handler(true));

        chain.handle(&mut exchange(None)).await.unwrap();

        let logs = logs.contents();
        assert!(logs.contains("downstream warning"), "{logs}");
        assert!(!logs.contains("tId"), "{logs}");
    }
}
