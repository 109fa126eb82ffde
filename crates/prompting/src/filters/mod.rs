//! Filter implementations for the record pipeline.

pub mod complete_attributes;
pub mod non_empty_text;

pub use complete_attributes::CompleteAttributesFilter;
pub use non_empty_text::NonEmptyTextFilter;
