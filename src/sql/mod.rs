//! SQL statement building
//!
//! Provides typed construction of SELECT statements and conditions with
//! literal escaping. Statements are plain text in the end; whether they are
//! passed through completeSQL is up to the caller.

pub mod condition;
pub mod literal;
pub mod select;

pub use condition::Condition;
pub use literal::{SqlExpr, format_literal, format_string};
pub use select::{Join, JoinKind, Select};

/// Field names are compared upper-case throughout.
pub fn normalise_field(field: &str) -> String {
    field.trim().to_uppercase()
}
