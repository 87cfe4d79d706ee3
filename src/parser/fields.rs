use std::borrow::Cow;

use regex::Regex;

use super::normalize::{clean_number, truncate_chars};
use crate::record::VehicleRecord;

const TITLE_MAX: usize = 100;
const COLOR_MAX: usize = 50;

/// Character set of a VIN: digits and capitals without I, O, Q.
const VIN_CODE: &str = "[A-HJ-NPR-Z0-9]{17}";

const VIN_LABELS: &str = "vin|numéro de série|no de série";
const YEAR_LABELS: &str = "année|year";
const DISTANCE_UNITS: &str = "km|kilomètres|kilométrage";
const COLOR_LABELS: &str = "couleur extérieure|exterior color|couleur";
const ENGINE_LABELS: &str = "moteur|engine";

/// (needle, canonical label), checked in order.
const FUEL_VOCABULARY: &[(&str, &str)] = &[
    ("essence", "Gasoline"),
    ("diesel", "Diesel"),
    ("électrique", "Electric"),
    ("hybride", "Hybrid"),
    ("gasoline", "Gasoline"),
    ("electric", "Electric"),
    ("hybrid", "Hybrid"),
];

/// Automatic rows come first.
const TRANSMISSION_VOCABULARY: &[(&str, &str)] = &[
    ("automatique", "Automatic"),
    ("automatic", "Automatic"),
    ("manuelle", "Manual"),
    ("manual", "Manual"),
];

const TRIM_VOCABULARY: &[(&str, &str)] = &[
    ("technik", "Technik"),
    ("komfort", "Komfort"),
    ("progressiv", "Progressiv"),
    ("premium", "Premium"),
    ("sport", "Sport"),
    ("s line", "S line"),
    ("quattro", "Quattro"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Vin,
    Year,
    Title,
    Price,
    Mileage,
    FuelType,
    Transmission,
    ExteriorColor,
    Engine,
    Trim,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Vin,
        Field::Year,
        Field::Title,
        Field::Price,
        Field::Mileage,
        Field::FuelType,
        Field::Transmission,
        Field::ExteriorColor,
        Field::Engine,
        Field::Trim,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Convert a raw match and store it. Returns false when the value is unusable,
    /// which leaves the field open for the next rule.
    pub fn assign(self, record: &mut VehicleRecord, raw: &str) -> bool {
        match self {
            Field::Vin => record.vin = Some(raw.to_uppercase()),
            Field::Year => record.year = raw.trim().parse().ok(),
            Field::Title => record.title = non_empty(truncate_chars(raw.trim(), TITLE_MAX)),
            Field::Price => record.price = clean_number(raw),
            Field::Mileage => record.mileage = clean_number(raw),
            Field::FuelType => record.fuel_type = raw.parse().ok(),
            Field::Transmission => record.transmission = raw.parse().ok(),
            Field::ExteriorColor => {
                record.exterior_color = non_empty(truncate_chars(raw.trim(), COLOR_MAX))
            }
            Field::Engine => record.engine = non_empty(raw.trim().to_string()),
            Field::Trim => record.trim = raw.parse().ok(),
        }
        self.is_set(record)
    }

    pub fn is_set(self, record: &VehicleRecord) -> bool {
        match self {
            Field::Vin => record.vin.is_some(),
            Field::Year => record.year.is_some(),
            Field::Title => record.title.is_some(),
            Field::Price => record.price.is_some(),
            Field::Mileage => record.mileage.is_some(),
            Field::FuelType => record.fuel_type.is_some(),
            Field::Transmission => record.transmission.is_some(),
            Field::ExteriorColor => record.exterior_color.is_some(),
            Field::Engine => record.engine.is_some(),
            Field::Trim => record.trim.is_some(),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Yields the first capture group that participated in the match.
    Pattern(Regex),
    /// Case-insensitive substring test; `needle` is stored lower-cased.
    Keyword { needle: String, value: &'static str },
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub field: Field,
    pub matcher: Matcher,
}

impl Rule {
    fn pattern(field: Field, re: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            field,
            matcher: Matcher::Pattern(Regex::new(re)?),
        })
    }

    fn keyword(field: Field, needle: &str, value: &'static str) -> Self {
        Self {
            field,
            matcher: Matcher::Keyword {
                needle: needle.to_lowercase(),
                value,
            },
        }
    }

    /// `lowered` must be `text.to_lowercase()`.
    pub fn probe<'t>(&self, text: &'t str, lowered: &str) -> Option<Cow<'t, str>> {
        match &self.matcher {
            Matcher::Pattern(re) => {
                let caps = re.captures(text)?;
                caps.iter()
                    .skip(1)
                    .flatten()
                    .next()
                    .map(|m| Cow::Borrowed(m.as_str()))
            }
            Matcher::Keyword { needle, value } => {
                lowered.contains(needle.as_str()).then_some(Cow::Borrowed(*value))
            }
        }
    }
}

/// Ordered extraction rules. Rows for one field are tried top to bottom.
#[derive(Debug, Clone)]
pub struct FieldTable {
    rules: Vec<Rule>,
}

impl FieldTable {
    /// Build the table for one make, e.g. `"Audi"`.
    pub fn for_brand(brand: &str) -> Result<Self, regex::Error> {
        let brand = regex::escape(brand);
        let mut rules = vec![
            // VIN: labeled first, bare token as fallback
            // A labeled code may be lower-case; folding the class never admits i, o or q.
            Rule::pattern(Field::Vin, &format!(r"(?i)(?:{VIN_LABELS})[:\s]*\b({VIN_CODE})\b"))?,
            Rule::pattern(Field::Vin, &format!(r"\b({VIN_CODE})\b"))?,
            // Year: next to the brand on the same line, either order
            Rule::pattern(
                Field::Year,
                &format!(r"\b(20[12][0-9])\b.*{brand}|{brand}.*\b(20[12][0-9])\b"),
            )?,
            Rule::pattern(Field::Year, &format!(r"(?i:{YEAR_LABELS})[:\s]*(\d{{4}})"))?,
            Rule::pattern(
                Field::Title,
                &format!(r"(20[12][0-9][ \t]+{brand}[ \t]+[A-Za-z0-9\- \t]+)"),
            )?,
            Rule::pattern(
                Field::Price,
                r"\b(\d[\d\p{Zs},]*)\p{Zs}*\$|\$\p{Zs}*(\d[\d\p{Zs},]*)",
            )?,
            Rule::pattern(
                Field::Mileage,
                &format!(r"(?i)\b(\d[\d\p{{Zs}},]*)\p{{Zs}}*(?:{DISTANCE_UNITS})"),
            )?,
        ];

        rules.extend(
            FUEL_VOCABULARY
                .iter()
                .map(|(needle, value)| Rule::keyword(Field::FuelType, needle, value)),
        );
        rules.extend(
            TRANSMISSION_VOCABULARY
                .iter()
                .map(|(needle, value)| Rule::keyword(Field::Transmission, needle, value)),
        );

        rules.push(Rule::pattern(
            Field::ExteriorColor,
            &format!(r"(?i)(?:{COLOR_LABELS})[:\s]*([A-Za-zÀ-ÿ\s]+?)(?:\n|,|$)"),
        )?);
        rules.push(Rule::pattern(
            Field::Engine,
            &format!(r"(?i)(?:{ENGINE_LABELS})[:\s]*([^\n]{{3,50}})"),
        )?);
        rules.push(Rule::pattern(
            Field::Engine,
            r"(?i)(\d+[.,]\d+\s*L\b|\d+\s*(?:cylindres?|cylinders?))",
        )?);

        rules.extend(
            TRIM_VOCABULARY
                .iter()
                .map(|(needle, value)| Rule::keyword(Field::Trim, needle, value)),
        );

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Append a row; it runs after every existing row for its field.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn push_keyword(&mut self, field: Field, needle: &str, value: &'static str) {
        self.push(Rule::keyword(field, needle, value));
    }
}
