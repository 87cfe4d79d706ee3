//! In-memory renderer for driving discovery and the pipeline in tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;

use super::{Affordance, RenderError, Renderer};

pub fn listing(n: usize) -> String {
    format!("https://dealer.test/inventaire/v?vehicleId={n}")
}

#[derive(Default)]
pub struct ScriptedRenderer {
    visible: Vec<String>,
    scroll_batches: VecDeque<Vec<String>>,
    click_batches: VecDeque<Vec<String>>,
    details: HashMap<String, Option<String>>,
    current_detail: Option<String>,
    next_generated: usize,

    /// Every scroll reveals one never-seen listing.
    pub endless: bool,
    /// Only the latest batch stays in the DOM.
    pub virtualized: bool,
    pub click_fails: bool,
    pub button_always: bool,
    pub entry_fails: bool,

    pub scrolls: usize,
    pub clicks: usize,
    pub click_attempts: usize,
    pub visits: Vec<String>,
}

impl ScriptedRenderer {
    pub fn new(initial: &[String]) -> Self {
        Self {
            visible: initial.to_vec(),
            next_generated: 10_000,
            ..Default::default()
        }
    }

    pub fn with_scrolls(mut self, batches: Vec<Vec<String>>) -> Self {
        self.scroll_batches.extend(batches);
        self
    }

    pub fn with_load_more(mut self, batches: Vec<Vec<String>>) -> Self {
        self.click_batches.extend(batches);
        self
    }

    pub fn with_detail(mut self, url: &str, text: &str) -> Self {
        self.details.insert(url.to_string(), Some(text.to_string()));
        self
    }

    /// Navigating to `url` times out.
    pub fn with_broken_detail(mut self, url: &str) -> Self {
        self.details.insert(url.to_string(), None);
        self
    }

    fn reveal(&mut self, batch: Vec<String>) {
        if self.virtualized {
            self.visible = batch;
        } else {
            self.visible.extend(batch);
        }
    }

    fn button_visible(&self) -> bool {
        self.button_always || !self.click_batches.is_empty()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        self.visits.push(url.to_string());
        let timed_out = || RenderError::Timeout {
            url: url.to_string(),
            after: timeout,
        };
        match self.details.get(url) {
            Some(Some(_)) => {
                self.current_detail = Some(url.to_string());
                Ok(())
            }
            Some(None) => {
                self.current_detail = None;
                Err(timed_out())
            }
            None if self.entry_fails => Err(timed_out()),
            None => {
                self.current_detail = None;
                Ok(())
            }
        }
    }

    async fn wait_settled(&mut self, _max: Duration) {}

    async fn current_text(&self) -> Result<String, RenderError> {
        match &self.current_detail {
            Some(url) => Ok(self.details[url].clone().unwrap_or_default()),
            None => Ok(self.visible.join("\n")),
        }
    }

    async fn evaluate_links(&self, _selector_hint: &str) -> Result<Vec<String>, RenderError> {
        Ok(self.visible.clone())
    }

    async fn affordance_present(&self, _affordance: &Affordance) -> Result<bool, RenderError> {
        Ok(self.button_visible())
    }

    async fn click_if_present(&mut self, _affordance: &Affordance) -> Result<bool, RenderError> {
        if !self.button_visible() {
            return Ok(false);
        }
        self.click_attempts += 1;
        if self.click_fails {
            return Err(RenderError::Interaction("button detached".to_string()));
        }
        let batch = self.click_batches.pop_front().unwrap_or_default();
        self.clicks += 1;
        self.reveal(batch);
        Ok(true)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError> {
        self.scrolls += 1;
        if self.endless {
            self.next_generated += 1;
            let fresh = listing(self.next_generated);
            self.reveal(vec![fresh]);
        } else if let Some(batch) = self.scroll_batches.pop_front() {
            self.reveal(batch);
        }
        Ok(())
    }
}
