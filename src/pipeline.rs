use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::inventory::{self, Discovery, DiscoveryError};
use crate::parser::Extractor;
use crate::record::{ListingId, VehicleRecord};
use crate::render::{RenderError, Renderer};
use crate::settings::Settings;

/// Visit stats returned after `fetch_all`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub visited: usize,
    pub kept: usize,
    pub degraded: usize,
    pub dropped: usize,
}

/// One renderer session driven through discovery and detail visits, in order.
pub struct Pipeline<R> {
    renderer: R,
    settings: Settings,
    extractor: Extractor,
    stats: FetchStats,
}

impl<R: Renderer> Pipeline<R> {
    pub fn new(renderer: R, settings: Settings) -> Result<Self, regex::Error> {
        let extractor = Extractor::for_brand(&settings.brand, &settings.site_url)?;
        Ok(Self {
            renderer,
            settings,
            extractor,
            stats: FetchStats::default(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub async fn discover(&mut self) -> Result<Discovery, DiscoveryError> {
        inventory::discover(&mut self.renderer, &self.settings).await
    }

    /// Visit every listing once. Failed visits become degraded records; only
    /// records with a price, title or VIN are returned.
    pub async fn fetch_all<'a, I>(&mut self, ids: I) -> Vec<VehicleRecord>
    where
        I: IntoIterator<Item = &'a ListingId>,
    {
        let ids: Vec<&ListingId> = ids.into_iter().collect();
        let pb = progress_bar(ids.len());
        let mut stats = FetchStats::default();
        let mut records = Vec::with_capacity(ids.len());

        for id in ids {
            stats.visited += 1;
            let record = match self.visit(id).await {
                Ok(text) => self.extractor.extract(id, &text),
                Err(e) => {
                    warn!("Detail page {} failed: {}", id, e);
                    stats.degraded += 1;
                    self.extractor.degraded(id)
                }
            };

            if record.is_meaningful() {
                stats.kept += 1;
                records.push(record);
            } else {
                stats.dropped += 1;
            }

            pb.inc(1);
            tokio::time::sleep(self.settings.visit_delay()).await;
        }

        pb.finish_and_clear();
        info!(
            "Visited {} listings ({} kept, {} degraded, {} dropped)",
            stats.visited, stats.kept, stats.degraded, stats.dropped
        );
        self.stats = stats;
        records
    }

    async fn visit(&mut self, id: &ListingId) -> Result<String, RenderError> {
        self.renderer
            .navigate(id.as_str(), self.settings.detail_timeout())
            .await?;
        self.renderer
            .wait_settled(self.settings.detail_settle())
            .await;
        self.renderer.current_text().await
    }

    /// Discover, then visit everything discovered. Only a failed entry page errors.
    pub async fn run(&mut self) -> Result<Vec<VehicleRecord>, DiscoveryError> {
        let discovery = self.discover().await?;
        Ok(self.fetch_all(&discovery.listings).await)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}
