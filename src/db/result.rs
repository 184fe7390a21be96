//! Tabular query results

use crate::sql::normalise_field;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ordered columns plus rows of tagged values. Column names are upper case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.iter().map(|c| normalise_field(c)).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<FieldValue>) {
        row.resize(self.columns.len(), FieldValue::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = normalise_field(name);
        self.columns.iter().position(|c| *c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(index))
    }

    /// Row as a column-name keyed map.
    pub fn row_map(&self, row: usize) -> Option<BTreeMap<String, FieldValue>> {
        let values = self.rows.get(row)?;
        Some(self.columns.iter().cloned().zip(values.iter().cloned()).collect())
    }

    pub fn row_maps(&self) -> Vec<BTreeMap<String, FieldValue>> {
        (0..self.rows.len()).filter_map(|i| self.row_map(i)).collect()
    }

    /// First column of the first row.
    pub fn single_value(&self) -> Option<&FieldValue> {
        self.rows.first().and_then(|r| r.first())
    }

    /// First column of every row.
    pub fn first_column(&self) -> Vec<FieldValue> {
        self.rows.iter().filter_map(|r| r.first().cloned()).collect()
    }

    pub fn column_values(&self, column: &str) -> Vec<FieldValue> {
        match self.column_index(column) {
            Some(index) => self.rows.iter().map(|r| r[index].clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Replaces each cell of `column` by `f(row)`.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(&BTreeMap<String, FieldValue>) -> FieldValue,
    {
        let Some(index) = self.column_index(column) else {
            return false;
        };
        for i in 0..self.rows.len() {
            if let Some(row) = self.row_map(i) {
                self.rows[i][index] = f(&row);
            }
        }
        true
    }

    /// Appends a derived column computed from each row.
    pub fn add_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(&BTreeMap<String, FieldValue>) -> FieldValue,
    {
        let values: Vec<FieldValue> = (0..self.rows.len())
            .filter_map(|i| self.row_map(i))
            .map(|row| f(&row))
            .collect();
        self.columns.push(normalise_field(column));
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    pub fn drop_column(&mut self, column: &str) -> bool {
        let Some(index) = self.column_index(column) else {
            return false;
        };
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        true
    }

    /// Renames columns for display. Renamed columns keep their exact spelling.
    pub fn rename_columns(&mut self, names: &HashMap<String, String>) {
        for column in &mut self.columns {
            if let Some(new_name) = names.get(column.as_str()).or_else(|| names.get(&column.to_lowercase())) {
                *column = new_name.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        let mut result = QueryResult::new(vec!["id".to_string(), "Bauftrag".to_string()]);
        result.push_row(vec![FieldValue::Int(1), "B-100".into()]);
        result.push_row(vec![FieldValue::Int(2)]);
        result
    }

    #[test]
    fn columns_are_upper_case_and_rows_padded() {
        let result = sample();
        assert_eq!(result.columns(), &["ID".to_string(), "BAUFTRAG".to_string()]);
        assert_eq!(result.value(1, "bauftrag"), Some(&FieldValue::Null));
        assert_eq!(result.single_value(), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn derived_and_dropped_columns() {
        let mut result = sample();
        result.add_column("LINK", |row| format!("#{}", row["ID"]).into());
        assert!(result.drop_column("id"));
        assert!(result.map_column("BAUFTRAG", |row| row["LINK"].clone()));

        assert_eq!(result.columns(), &["BAUFTRAG".to_string(), "LINK".to_string()]);
        assert_eq!(result.value(1, "BAUFTRAG"), Some(&FieldValue::from("#2")));
        assert!(!result.drop_column("missing"));
    }

    #[test]
    fn rename_for_display() {
        let mut result = sample();
        let names = HashMap::from([("BAUFTRAG".to_string(), "Betriebsauftrag".to_string())]);
        result.rename_columns(&names);
        assert_eq!(result.columns()[1], "Betriebsauftrag");
    }
}
