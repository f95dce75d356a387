//! Citation rendering off the async runtime.
//!
//! Style lookups may read from disk and rendering is CPU bound, so both run
//! on the blocking pool. Each call carries a [`CancelFlag`] that is raised
//! when the handler future is dropped (client gone) or the configured
//! timeout expires; the engine checks it between entries.

use std::time::Duration;

use refshelf_core::Entry;
use refshelf_format::{CancelFlag, CitationEngine, RenderError, RenderMode, RenderOutput, StyleHandle};

use crate::error::ApiError;

/// Raises the flag when dropped.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Runs the citation engine with an optional time bound.
#[derive(Debug, Clone)]
pub struct Renderer {
    engine: CitationEngine,
    timeout: Option<Duration>,
}

impl Renderer {
    pub fn new(engine: CitationEngine, timeout: Option<Duration>) -> Self {
        Self { engine, timeout }
    }

    pub fn engine(&self) -> &CitationEngine {
        &self.engine
    }

    /// Resolves a style name; unknown styles are an unsupported representation.
    pub async fn resolve_style(&self, name: &str) -> Result<StyleHandle, ApiError> {
        let engine = self.engine.clone();
        let name = name.to_string();
        self.run(move |_| engine.resolve(&name)).await
    }

    /// Renders entries in the given order.
    pub async fn render(
        &self,
        entries: Vec<Entry>,
        style: StyleHandle,
        mode: RenderMode,
    ) -> Result<RenderOutput, ApiError> {
        let engine = self.engine.clone();
        self.run(move |cancel| engine.render(&entries, &style, mode, &cancel))
            .await
    }

    /// Drops cached style lookups.
    pub fn invalidate_styles(&self) {
        self.engine.catalog().invalidate();
    }

    async fn run<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(CancelFlag) -> Result<T, RenderError> + Send + 'static,
    {
        let cancel = CancelFlag::new();
        let _guard = CancelOnDrop(cancel.clone());
        let task = tokio::task::spawn_blocking(move || work(cancel));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(timeout_ms = limit.as_millis() as u64, "Rendering timed out");
                    return Err(ApiError::Render(format!(
                        "rendering did not finish within {} ms",
                        limit.as_millis()
                    )));
                }
            },
            None => task.await,
        };

        let result = joined.map_err(|e| ApiError::Internal(format!("render task failed: {}", e)))?;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use refshelf_core::{EntryId, EntryType};
    use refshelf_format::BuiltinCatalog;

    fn renderer(timeout: Option<Duration>) -> Renderer {
        let catalog = Arc::new(BuiltinCatalog::load().unwrap());
        Renderer::new(CitationEngine::new(catalog), timeout)
    }

    fn entry() -> Entry {
        Entry::new(EntryId::new("knuth1984").unwrap(), EntryType::Book)
            .with_field("author", "Knuth, Donald E.")
            .with_field("title", "The TeXbook")
            .with_field("publisher", "Addison-Wesley")
            .with_field("year", "1984")
    }

    #[tokio::test]
    async fn test_render_inline() {
        let renderer = renderer(None);
        let style = renderer.resolve_style("apa").await.unwrap();
        let output = renderer
            .render(vec![entry()], style, RenderMode::Inline)
            .await
            .unwrap();
        assert_eq!(output.text, "(Knuth, 1984)");
    }

    #[tokio::test]
    async fn test_unknown_style_is_unsupported() {
        let err = renderer(None).resolve_style("unknown-style").await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_timeout_is_a_render_error() {
        let renderer = renderer(Some(Duration::from_millis(10)));
        let err = renderer
            .run(|cancel| {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err::<(), _>(RenderError::Cancelled)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "RenderError");
    }

    #[tokio::test]
    async fn test_flag_raised_when_caller_goes_away() {
        let renderer = renderer(None);
        let seen = CancelFlag::new();
        let observed = seen.clone();
        let call = renderer.run(move |cancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            observed.cancel();
            Ok(())
        });
        // Dropping the future before completion must stop the worker.
        let _ = tokio::time::timeout(Duration::from_millis(20), call).await;
        for _ in 0..200 {
            if seen.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(seen.is_cancelled());
    }
}
