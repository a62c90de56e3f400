//! Views, their parameters and serving configuration.

mod config;
mod meta;
mod parameter;

pub use config::{HttpMethod, RelationConfig, ViewConfig};
pub use meta::ViewMeta;
pub use parameter::{Cardinality, Parameter, ParameterKind};
