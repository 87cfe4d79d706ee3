//! Listing discovery on a lazily loaded inventory page.
//!
//! The entry page reveals listings as it is scrolled and, on some sites, only after a
//! "load more" button is pressed. Discovery alternates scans and expansions until a
//! pass adds nothing and no button is left, or the expansion budget runs out.

use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::ListingId;
use crate::render::{Affordance, RenderError, Renderer};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("entry page {url} unavailable")]
    EntryUnavailable {
        url: String,
        #[source]
        source: RenderError,
    },

    #[error("could not scan for listing links")]
    Scan(#[source] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// A pass found nothing new and there was nothing left to press.
    Exhausted,
    /// Every allowed expansion was used.
    BudgetSpent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Scanning,
    Expanding,
    Converged(Convergence),
}

/// Working state of one discovery run. `known` only ever grows.
#[derive(Debug)]
pub struct DiscoveryState {
    pub phase: Phase,
    known: IndexSet<ListingId>,
    zero_streak: u32,
    expansions: u32,
    scans: u32,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Loading,
            known: IndexSet::new(),
            zero_streak: 0,
            expansions: 0,
            scans: 0,
        }
    }

    /// Union one scan into the working set. Returns how many ids were new.
    pub fn absorb<I, S>(&mut self, hrefs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.known.len();
        self.known
            .extend(hrefs.into_iter().filter_map(|h| ListingId::parse(h.as_ref())));
        let added = self.known.len() - before;

        self.scans += 1;
        if added == 0 {
            self.zero_streak += 1;
        } else {
            self.zero_streak = 0;
        }
        added
    }

    pub fn known(&self) -> &IndexSet<ListingId> {
        &self.known
    }

    pub fn zero_streak(&self) -> u32 {
        self.zero_streak
    }

    pub fn expansions(&self) -> u32 {
        self.expansions
    }

    fn finish(self, reason: Convergence) -> Discovery {
        Discovery {
            listings: self.known,
            expansions: self.expansions,
            scans: self.scans,
            reason,
        }
    }
}

impl Default for DiscoveryState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Discovery {
    /// In first-seen order.
    pub listings: IndexSet<ListingId>,
    pub expansions: u32,
    pub scans: u32,
    pub reason: Convergence,
}

pub async fn discover<R: Renderer + ?Sized>(
    renderer: &mut R,
    settings: &Settings,
) -> Result<Discovery, DiscoveryError> {
    let affordance = Affordance::new(&settings.load_more_labels);
    let mut state = DiscoveryState::new();
    let mut last_added = 0usize;

    loop {
        match state.phase {
            Phase::Loading => {
                info!("Loading inventory at {}", settings.entry_url);
                renderer
                    .navigate(&settings.entry_url, settings.entry_timeout())
                    .await
                    .map_err(|source| DiscoveryError::EntryUnavailable {
                        url: settings.entry_url.clone(),
                        source,
                    })?;
                renderer.wait_settled(settings.initial_settle()).await;
                state.phase = Phase::Scanning;
            }
            Phase::Scanning => {
                let hrefs = renderer
                    .evaluate_links(&settings.listing_selector)
                    .await
                    .map_err(DiscoveryError::Scan)?;
                last_added = state.absorb(&hrefs);
                debug!(
                    scan = state.scans,
                    added = last_added,
                    total = state.known.len(),
                    "scanned listing links"
                );

                state.phase = if state.expansions > 0
                    && last_added == 0
                    && !button_present(renderer, &affordance).await
                {
                    Phase::Converged(Convergence::Exhausted)
                } else {
                    Phase::Expanding
                };
            }
            Phase::Expanding => {
                if state.expansions >= settings.max_expansions {
                    state.phase = Phase::Converged(Convergence::BudgetSpent);
                    continue;
                }

                let clicked = state.zero_streak > settings.load_more_after
                    && press_load_more(renderer, &affordance, settings).await;
                if clicked {
                    state.zero_streak = 0;
                } else {
                    if let Err(e) = renderer.scroll_to_bottom().await {
                        warn!("Scroll failed, continuing: {}", e);
                    }
                    renderer.wait_settled(settings.scroll_settle()).await;
                }

                state.expansions += 1;
                state.phase = Phase::Scanning;
            }
            Phase::Converged(reason) => {
                info!(
                    "Discovered {} listings ({} expansions, {} scans, {:?}, last pass +{})",
                    state.known.len(),
                    state.expansions,
                    state.scans,
                    reason,
                    last_added
                );
                return Ok(state.finish(reason));
            }
        }
    }
}

async fn button_present<R: Renderer + ?Sized>(renderer: &R, affordance: &Affordance) -> bool {
    match renderer.affordance_present(affordance).await {
        Ok(present) => present,
        Err(e) => {
            debug!("Affordance probe failed, treating as absent: {}", e);
            false
        }
    }
}

async fn press_load_more<R: Renderer + ?Sized>(
    renderer: &mut R,
    affordance: &Affordance,
    settings: &Settings,
) -> bool {
    match renderer.click_if_present(affordance).await {
        Ok(true) => {
            debug!("Pressed load more");
            renderer.wait_settled(settings.click_settle()).await;
            true
        }
        Ok(false) => false,
        Err(e) => {
            warn!("Load more click failed, scrolling instead: {}", e);
            false
        }
    }
}
