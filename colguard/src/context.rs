//! Context binding a cell ciphertext to its table and column.

use std::fmt;

/// Context for cell encryption, bound to the ciphertext as associated data.
///
/// A cell encrypted for `personnel.zip` fails authentication if it is
/// presented as any other column.
///
/// # Example
///
/// ```
/// use colguard::context::CellContext;
///
/// let ctx = CellContext::new("personnel", "zip");
/// assert_eq!(ctx.to_string(), "personnel|zip");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellContext {
    table_name: String,
    column_name: String,
}

impl CellContext {
    /// Creates a new cell context.
    #[must_use]
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), column_name: column_name.into() }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &str {
        &self.column_name
    }
}

impl fmt::Display for CellContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.table_name, self.column_name)
    }
}
