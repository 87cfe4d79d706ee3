use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Everything one run needs to know about the target site and its pacing.
///
/// Every key can be overridden from the environment, e.g. `INVENTORY_MAX_EXPANSIONS=5`
/// or `INVENTORY_LOAD_MORE_LABELS="Voir plus,Load more"`.
///
/// The `*_settle_ms` values bound `Renderer::wait_settled`; a live-DOM backend waits up to
/// them, while the snapshot backend has nothing to wait for and returns at once.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub entry_url: String,
    pub site_url: String,
    pub brand: String,
    pub listing_selector: String,
    pub load_more_labels: Vec<String>,
    pub entry_timeout_ms: u64,
    pub detail_timeout_ms: u64,
    pub initial_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub click_settle_ms: u64,
    pub detail_settle_ms: u64,
    pub visit_delay_ms: u64,
    pub max_expansions: u32,
    pub load_more_after: u32,
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entry_url: "https://www.audiwestisland.com/fr/inventaire/occasion/".to_string(),
            site_url: "https://www.audiwestisland.com".to_string(),
            brand: "Audi".to_string(),
            listing_selector: r#"a[href*="vehicleId"]"#.to_string(),
            load_more_labels: vec![
                "Voir plus".to_string(),
                "Load more".to_string(),
                "Afficher plus".to_string(),
            ],
            entry_timeout_ms: 60_000,
            detail_timeout_ms: 30_000,
            initial_settle_ms: 10_000,
            scroll_settle_ms: 2_000,
            click_settle_ms: 3_000,
            detail_settle_ms: 5_000,
            visit_delay_ms: 500,
            max_expansions: 20,
            load_more_after: 2,
            db_path: "data/inventory.sqlite".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(
            Environment::with_prefix("INVENTORY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("load_more_labels"),
        )
    }

    fn from_source(source: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_millis(self.detail_timeout_ms)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }

    pub fn visit_delay(&self) -> Duration {
        Duration::from_millis(self.visit_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_source(
            Environment::with_prefix("INVENTORY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("load_more_labels")
                .source(Some(map)),
        )
        .unwrap()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from_vars(&[]), Settings::default());
    }

    #[test]
    fn overrides_are_typed() {
        let s = from_vars(&[
            ("INVENTORY_MAX_EXPANSIONS", "5"),
            ("INVENTORY_VISIT_DELAY_MS", "0"),
            ("INVENTORY_BRAND", "Volkswagen"),
            ("INVENTORY_LOAD_MORE_LABELS", "Plus,More"),
        ]);
        assert_eq!(s.max_expansions, 5);
        assert_eq!(s.visit_delay(), Duration::ZERO);
        assert_eq!(s.brand, "Volkswagen");
        assert_eq!(s.load_more_labels, vec!["Plus", "More"]);
        assert_eq!(s.entry_timeout(), Duration::from_secs(60));
    }
}
