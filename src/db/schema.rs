//! Introspected database structure and its prompt rendering.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Tables the model may query, sorted by name, plus the relationships
/// between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive table lookup; SQLite identifiers are case-insensitive.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Markdown block fed into the SQL prompt.
    ///
    /// Each table is a `### NAME` heading with one bullet per column and per
    /// unique index, followed by a `### Relaciones` list of foreign keys.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::new();

        for table in &self.tables {
            let _ = writeln!(out, "### {}", table.name);
            for column in &table.columns {
                let _ = writeln!(out, "- {}", describe_column(table, column));
            }
            for index in table.indexes.iter().filter(|i| i.is_unique) {
                let _ = writeln!(out, "- UNIQUE ({})", index.columns.join(", "));
            }
            out.push('\n');
        }

        if !self.foreign_keys.is_empty() {
            out.push_str("### Relaciones\n");
            for fk in &self.foreign_keys {
                let _ = writeln!(out, "- {fk}");
            }
        }

        out.trim_end().to_string()
    }
}

/// `numero: VARCHAR(10) (NOT NULL)`; undeclared types show as `ANY`.
fn describe_column(table: &Table, column: &Column) -> String {
    let data_type = match column.data_type.as_str() {
        "" => "ANY",
        declared => declared,
    };

    let annotations: Vec<String> = [
        table.primary_key.contains(&column.name).then(|| "PK".to_string()),
        (!column.is_nullable).then(|| "NOT NULL".to_string()),
        column.default.as_ref().map(|d| format!("DEFAULT {d}")),
    ]
    .into_iter()
    .flatten()
    .collect();

    if annotations.is_empty() {
        format!("{}: {}", column.name, data_type)
    } else {
        format!("{}: {} ({})", column.name, data_type, annotations.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
    /// Explicit and constraint-backed indexes, excluding the primary key.
    pub indexes: Vec<Index>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared type as written in the DDL; empty when undeclared.
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

impl Column {
    /// A nullable column without a default.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            default: None,
        }
    }

    pub fn nullable(self, is_nullable: bool) -> Self {
        Self {
            is_nullable,
            ..self
        }
    }

    pub fn with_default(self, default: impl Into<String>) -> Self {
        Self {
            default: Some(default.into()),
            ..self
        }
    }
}

/// `from_table(from_columns)` references `to_table(to_columns)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Single-column reference, the only shape the hotel schema uses.
    pub fn single(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_columns: vec![from_column.into()],
            to_table: to_table.into(),
            to_columns: vec![to_column.into()],
        }
    }
}

impl std::fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from_table,
            self.from_columns.join(", "),
            self.to_table,
            self.to_columns.join(", ")
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
}
