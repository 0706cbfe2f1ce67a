use async_trait::async_trait;
use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("invalid table identifier `{0}`: {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("warehouse request failed: {0}")]
    Connection(String),

    #[error("statement failed: {0}")]
    Statement(String),
}

/// A dot-separated table identifier such as `catalog.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    parts: Vec<String>,
}

impl TableName {
    /// Back-tick quoted form for use in SQL text.
    pub fn quoted(&self) -> String {
        self.parts
            .iter()
            .map(|p| quote_ident(p))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for TableName {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why| CatalogError::InvalidIdentifier(s.to_string(), why);
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        let parts = split_parts(trimmed).map_err(invalid)?;
        if parts.len() > 3 {
            return Err(invalid("at most catalog.schema.table"));
        }
        if parts.iter().any(String::is_empty) {
            return Err(invalid("empty name part"));
        }
        Ok(Self { parts })
    }
}

/// Split on `.` outside back-ticks. A part that is already back-tick quoted is
/// unquoted here, a doubled back-tick inside it reading as one, and is
/// re-quoted by `quoted()`.
fn split_parts(s: &str) -> Result<Vec<String>, &'static str> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '`' if current.is_empty() => {
                loop {
                    match chars.next() {
                        Some('`') if chars.peek() == Some(&'`') => {
                            chars.next();
                            current.push('`');
                        }
                        Some('`') => break,
                        Some(c) => current.push(c),
                        None => return Err("unterminated back-tick"),
                    }
                }
                if !matches!(chars.peek(), None | Some('.')) {
                    return Err("unexpected text after quoted name part");
                }
            }
            '.' => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    Ok(parts)
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// Quote an identifier with back-ticks, doubling any embedded back-tick.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Read and extend the column list of remote tables.
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Column names of `table` in definition order.
    async fn columns(&self, table: &TableName) -> Result<Vec<String>, CatalogError>;

    /// Append one nullable column of `sql_type` to `table`.
    async fn add_column(
        &self,
        table: &TableName,
        column: &str,
        sql_type: &str,
    ) -> Result<(), CatalogError>;
}
