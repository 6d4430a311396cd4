//! The generic parameter table every backend is driven from.
//! Use [ParameterTable] for storage and [keys] for the well-known key names.

pub mod keys;
mod table;
mod value;

pub use table::{ParameterError, ParameterTable};
pub use value::{FromParam, ParamValue};
