//! Declared row shapes
//!
//! Every resource declares the fields its rows carry. The declared schema
//! is what keeps a resource's output stable across runs:
//!
//! - **Normalization**: mapped records are coerced to exactly the declared
//!   fields (unexpected fields dropped, missing optional fields null)
//! - **Validation**: a missing required field or a value of the wrong JSON
//!   type is a mapping error
//! - **Arrow/SQL types**: sinks derive their table layout from it

mod types;

pub use types::{FieldDef, FieldType, TableSchema};
