//! Stage boundary contracts.
//!
//! Each stage declares one [`Schema`] for the variables it consumes and one
//! for the outputs it produces. Validation reports the dotted path of the
//! first offending field.

mod schema;

pub use schema::{FieldKind, FieldSpec, Schema, SchemaViolation};
