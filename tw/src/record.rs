//! In-memory representation of a loaded table
//!
//! A [`RecordSet`] is an ordered list of [`Row`]s in file line order. Rows are
//! never edited after construction; a reload swaps the whole set.

use std::ops::Index;
use std::slice;

/// One line of the backing file, split into fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    /// Create a row from its fields
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Fields in column order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields (rows may differ)
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Join the fields with the given separator
    pub fn join(&self, sep: &str) -> String {
        self.fields.join(sep)
    }
}

impl From<Vec<String>> for Row {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl From<Vec<&str>> for Row {
    fn from(fields: Vec<&str>) -> Self {
        Self::new(fields.into_iter().map(String::from).collect())
    }
}

/// The whole dataset, in file line order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSet {
    rows: Vec<Row>,
}

impl RecordSet {
    /// Create a record set from rows
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Fields of every row as plain vectors, mostly useful for comparisons
    pub fn to_vecs(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(|row| row.fields().to_vec()).collect()
    }
}

impl From<Vec<Row>> for RecordSet {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

impl FromIterator<Row> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for RecordSet {
    type Output = Row;

    fn index(&self, index: usize) -> &Self::Output {
        &self.rows[index]
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Row;
    type IntoIter = slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
