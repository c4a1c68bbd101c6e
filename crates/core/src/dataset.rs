use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique dataset identifier.
pub type DatasetId = Uuid;

/// What kind of data a dataset column holds.
///
/// `Score` marks columns produced by a previous scoring run; they are
/// selectable in rules like any numeric column but are reported separately
/// in distribution summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    Score,
}

/// One column of a registered dataset. Immutable once the dataset is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Numeric }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Text }
    }
}

/// A single cell value in a gene row.
///
/// Serializes untagged: numbers as JSON numbers, text as strings, missing
/// as `null` — matching the row payloads uploaders already produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Extract as f64, returning None for text or missing cells.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract as string, returning None for numeric or missing cells.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One record of the dataset being scored, keyed by gene symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneRow {
    pub gene_symbol: String,
    /// Column name → cell value. Insertion order preserved for presentation.
    pub values: IndexMap<String, CellValue>,
}

impl GeneRow {
    pub fn new(gene_symbol: impl Into<String>) -> Self {
        Self {
            gene_symbol: gene_symbol.into(),
            values: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, column: impl Into<String>, value: CellValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    /// Look up a cell by column name. Absent columns read as missing.
    pub fn get(&self, column: &str) -> &CellValue {
        static MISSING: CellValue = CellValue::Missing;
        self.values.get(column).unwrap_or(&MISSING)
    }
}

/// A registered dataset: column catalog plus row data.
///
/// Rows are read-only for the duration of any job referencing the dataset;
/// the store replaces the whole dataset on re-upload rather than mutating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<GeneRow>,
    pub registered_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, rows: Vec<GeneRow>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            columns,
            rows,
            registered_at: Utc::now(),
        }
    }

    /// Names of all columns in the catalog.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
