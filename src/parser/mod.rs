pub mod extract;
pub mod fields;
pub mod normalize;

pub use extract::Extractor;
pub use fields::{Field, FieldTable, Matcher, Rule};
pub use normalize::{clean_number, normalize};
