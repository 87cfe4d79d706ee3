use super::fields::{Field, FieldTable};
use super::normalize::normalize;
use crate::record::{ListingId, VehicleRecord};

/// Turns the rendered text of one detail page into a `VehicleRecord`.
#[derive(Debug, Clone)]
pub struct Extractor {
    table: FieldTable,
    website_url: String,
}

impl Extractor {
    pub fn new(table: FieldTable, website_url: &str) -> Self {
        Self {
            table,
            website_url: website_url.to_string(),
        }
    }

    pub fn for_brand(brand: &str, website_url: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(FieldTable::for_brand(brand)?, website_url))
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn website_url(&self) -> &str {
        &self.website_url
    }

    /// Runs the table in order; a field is decided by the first rule that yields a
    /// usable value. Missing fields stay `None`, this never fails.
    pub fn extract(&self, id: &ListingId, page_text: &str) -> VehicleRecord {
        let text = normalize(page_text);
        let lowered = text.to_lowercase();
        let mut record = VehicleRecord::bare(id.clone(), &self.website_url);
        let mut decided = [false; Field::ALL.len()];

        for rule in self.table.rules() {
            let slot = rule.field.index();
            if decided[slot] {
                continue;
            }
            if let Some(raw) = rule.probe(&text, &lowered) {
                decided[slot] = rule.field.assign(&mut record, &raw);
            }
        }

        record
    }

    pub fn degraded(&self, id: &ListingId) -> VehicleRecord {
        VehicleRecord::bare(id.clone(), &self.website_url)
    }
}
