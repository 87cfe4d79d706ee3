use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every key a serialized `VehicleRecord` carries, in column order.
pub const FIELD_KEYS: &[&str] = &[
    "listing_url",
    "website_url",
    "title",
    "vin",
    "price",
    "mileage",
    "year",
    "fuel_type",
    "transmission",
    "exterior_color",
    "engine",
    "trim",
    "scraped_at",
];

/// URL of one vehicle's detail page. The dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// Trimmed, non-blank URL, or `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ListingId {
    /// Unchecked; blank ids are filtered out by `dedup::finalize`.
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuelType {
    Gasoline,
    Diesel,
    Electric,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transmission {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trim {
    Technik,
    Komfort,
    Progressiv,
    Premium,
    Sport,
    #[serde(rename = "S line")]
    SLine,
    Quattro,
}

/// Unknown label for a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {label:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub label: String,
}

macro_rules! labels {
    ($ty:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($ty::$variant),)+
                    _ => Err(UnknownLabel { kind: $kind, label: s.to_string() }),
                }
            }
        }
    };
}

labels!(FuelType, "fuel type", {
    Gasoline => "Gasoline",
    Diesel => "Diesel",
    Electric => "Electric",
    Hybrid => "Hybrid",
});

labels!(Transmission, "transmission", {
    Automatic => "Automatic",
    Manual => "Manual",
});

labels!(Trim, "trim", {
    Technik => "Technik",
    Komfort => "Komfort",
    Progressiv => "Progressiv",
    Premium => "Premium",
    Sport => "Sport",
    SLine => "S line",
    Quattro => "Quattro",
});

/// One vehicle listing. `None` is the absence marker; serialization keeps every key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub listing_url: ListingId,
    pub website_url: String,
    pub title: Option<String>,
    pub vin: Option<String>,
    pub price: Option<f64>,
    pub mileage: Option<f64>,
    pub year: Option<i32>,
    pub fuel_type: Option<FuelType>,
    pub transmission: Option<Transmission>,
    pub exterior_color: Option<String>,
    pub engine: Option<String>,
    pub trim: Option<Trim>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl VehicleRecord {
    /// Identity and source site only. Also the shape of a degraded record.
    pub fn bare(listing_url: ListingId, website_url: &str) -> Self {
        Self {
            listing_url,
            website_url: website_url.to_string(),
            title: None,
            vin: None,
            price: None,
            mileage: None,
            year: None,
            fuel_type: None,
            transmission: None,
            exterior_color: None,
            engine: None,
            trim: None,
            scraped_at: None,
        }
    }

    /// Retention rule: at least one of price, title, VIN.
    pub fn is_meaningful(&self) -> bool {
        self.price.is_some() || self.title.is_some() || self.vin.is_some()
    }
}
