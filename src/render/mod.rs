//! The rendering capability the pipeline drives.
//!
//! Discovery and detail visits only talk to [`Renderer`]; a concrete backend
//! owns the page session. [`SnapshotRenderer`] is the bundled backend, fed by
//! plain HTTP or by spider.cloud.

pub mod fetch;
pub mod snapshot;

#[cfg(test)]
pub mod testing;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use fetch::{Fetcher, HttpFetcher, PageFetcher, SpiderFetcher};
pub use snapshot::SnapshotRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("timed out after {after:?} loading {url}")]
    Timeout { url: String, after: Duration },

    #[error("failed to load {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no page loaded")]
    NoPage,

    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("interaction failed: {0}")]
    Interaction(String),
}

/// An interactive element found by its visible label, e.g. a "load more" button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordance {
    labels: Vec<String>,
}

impl Affordance {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|l| l.as_ref().trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive "has text" match against the element's visible text.
    pub fn matches(&self, visible_text: &str) -> bool {
        let text = visible_text.to_lowercase();
        self.labels.iter().any(|l| text.contains(l.as_str()))
    }

    /// Whole-text match, ignoring case and runs of whitespace.
    pub fn is_label(&self, visible_text: &str) -> bool {
        let text = visible_text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        self.labels.iter().any(|l| *l == text)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A single page session. Calls are strictly sequential.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    /// Bounded wait for late content to appear.
    async fn wait_settled(&mut self, max: Duration);

    async fn current_text(&self) -> Result<String, RenderError>;

    /// Absolute hrefs of every element matching `selector_hint`.
    async fn evaluate_links(&self, selector_hint: &str) -> Result<Vec<String>, RenderError>;

    async fn affordance_present(&self, affordance: &Affordance) -> Result<bool, RenderError>;

    /// `Ok(false)` when the affordance is absent; `Err` when it is there but the click fails.
    async fn click_if_present(&mut self, affordance: &Affordance) -> Result<bool, RenderError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affordance_matches_any_label_ignoring_case() {
        let a = Affordance::new(["Voir plus", "Load more", "  "]);
        assert_eq!(a.labels().len(), 2);
        assert!(a.matches("  VOIR PLUS de véhicules "));
        assert!(a.matches("Load More"));
        assert!(!a.matches("Voir le véhicule"));
    }

    #[test]
    fn label_match_needs_the_whole_text() {
        let a = Affordance::new(["Voir plus"]);
        assert!(a.is_label("\n  VOIR   plus "));
        assert!(!a.is_label("Voir plus de détails"));
    }
}
