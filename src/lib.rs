//! Vehicle inventory extraction: discover every listing on a lazily loaded dealer
//! inventory page, extract structured fields from each detail page, and collapse the
//! batch to one record per listing before it is stored.

pub mod db;
pub mod dedup;
pub mod inventory;
pub mod parser;
pub mod pipeline;
pub mod predict;
pub mod record;
pub mod render;
pub mod settings;

pub use dedup::finalize;
pub use pipeline::Pipeline;
pub use record::{ListingId, VehicleRecord};
pub use settings::Settings;
