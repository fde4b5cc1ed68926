//! Task-local logging context.
//!
//! A small key/value map bound to the async task handling a request. The
//! middleware chain opens one with [`scope`] per request unless its caller
//! already did; middleware and handlers
//! read and write it through the free functions below. Outside a scope
//! every write is a no-op and every read returns `None`.
//!
//! [`put_scoped`] returns a [`ScopedEntry`] that removes the key when it
//! is dropped, so a value set for one request cannot survive into later
//! work on the same task, whichever way the request ends.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::Future;

tokio::task_local! {
    static CONTEXT: RefCell<BTreeMap<String, String>>;
}

/// Run `future` with a fresh, empty logging context.
pub async fn scope<F>(future: F) -> F::Output
where
    F: Future,
{
    CONTEXT.scope(RefCell::new(BTreeMap::new()), future).await
}

/// Whether the current task has a logging context.
#[must_use]
pub fn is_active() -> bool {
    CONTEXT.try_with(|_| ()).is_ok()
}

/// Insert `value` under `key`, returning the previous value.
pub fn put(key: &str, value: impl Into<String>) -> Option<String> {
    let value = value.into();
    CONTEXT
        .try_with(|ctx| ctx.borrow_mut().insert(key.to_string(), value))
        .ok()
        .flatten()
}

#[must_use]
pub fn get(key: &str) -> Option<String> {
    CONTEXT
        .try_with(|ctx| ctx.borrow().get(key).cloned())
        .ok()
        .flatten()
}

pub fn remove(key: &str) -> Option<String> {
    CONTEXT
        .try_with(|ctx| ctx.borrow_mut().remove(key))
        .ok()
        .flatten()
}

/// Copy of every entry in the current context.
#[must_use]
pub fn snapshot() -> BTreeMap<String, String> {
    CONTEXT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_default()
}

/// Insert `value` under `key` until the returned guard is dropped.
#[must_use = "the entry is removed as soon as the guard is dropped"]
pub fn put_scoped(key: &'static str, value: impl Into<String>) -> ScopedEntry {
    put(key, value);
    ScopedEntry { key }
}

/// Removes its key from the logging context on drop.
#[derive(Debug)]
pub struct ScopedEntry {
    key: &'static str,
}

impl Drop for ScopedEntry {
    fn drop(&mut self) {
        remove(self.key);
    }
}
