//! YAML config source backed by [`FileSource`].

use std::path::PathBuf;

use super::file_source::FileSource;
use crate::config::model::TraceabilityConfig;

#[must_use]
pub fn new(path: PathBuf) -> FileSource {
    FileSource::new(path, "yaml", |content| {
        serde_yml::from_str::<TraceabilityConfig>(content)
            .map_err(|e| Box::new(e) as crate::error::BoxError)
    })
}
