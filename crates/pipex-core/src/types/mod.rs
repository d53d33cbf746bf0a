//! Document tree types
//!
//! - `Value` - a node of the expanded document
//! - `Mapping` - an ordered mapping node

pub mod mapping;
pub mod value;

pub use mapping::Mapping;
pub use value::{format_number, Value};
