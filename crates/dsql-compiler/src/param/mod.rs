//! Parameter occurrences and their iteration.

mod iterator;
mod meta;

pub use iterator::ParamIterator;
pub use meta::{ParamMeta, SelectorParts};
