//! Columnar feature tables keyed by a unique string field.
//!
//! A [`FeatureTable`] is the in-memory equivalent of a GIS feature class:
//! one row per feature, an optional polygon per row, and any number of
//! nullable numeric fields. It supports the attribute operations an index
//! run performs on the hexagon table: keyed field joins, row-wise field
//! calculation, and min-max standardization.

use std::collections::HashMap;

use geo::Polygon;
use tracing::debug;

use crate::error::{GeoprocessingError, Result};
use crate::standardize::{standardize_values, Standardization};

/// In-memory feature table.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    name: String,
    key_field: String,
    keys: Vec<String>,
    index: HashMap<String, usize>,
    geometry: Vec<Option<Polygon<f64>>>,
    fields: Vec<(String, Vec<Option<f64>>)>,
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a FeatureTable,
    row: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.row
    }

    pub fn key(&self) -> &'a str {
        &self.table.keys[self.row]
    }

    pub fn geometry(&self) -> Option<&'a Polygon<f64>> {
        self.table.geometry[self.row].as_ref()
    }

    /// Field value; `None` when the field is null or absent.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.table
            .field_position(field)
            .and_then(|pos| self.table.fields[pos].1[self.row])
    }
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            keys: Vec::new(),
            index: HashMap::new(),
            geometry: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Field names in creation order (key field excluded).
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.field_position(field).is_some()
    }

    fn field_position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }

    /// Row index of a key.
    pub fn find(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Append a feature; every existing field starts null for it.
    pub fn insert(&mut self, key: impl Into<String>, geometry: Option<Polygon<f64>>) -> Result<usize> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(GeoprocessingError::DuplicateKey {
                table: self.name.clone(),
                key,
            });
        }

        let row = self.keys.len();
        self.index.insert(key.clone(), row);
        self.keys.push(key);
        self.geometry.push(geometry);
        for (_, values) in &mut self.fields {
            values.push(None);
        }
        Ok(row)
    }

    /// Add a null-filled field if it does not exist yet.
    pub fn add_field(&mut self, field: &str) {
        if !self.has_field(field) {
            self.fields.push((field.to_string(), vec![None; self.keys.len()]));
        }
    }

    /// Replace (or create) a whole column.
    pub fn set_column(&mut self, field: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.len() {
            return Err(GeoprocessingError::InvalidTable(format!(
                "column '{}' has {} values for {} rows",
                field,
                values.len(),
                self.len()
            )));
        }
        match self.field_position(field) {
            Some(pos) => self.fields[pos].1 = values,
            None => self.fields.push((field.to_string(), values)),
        }
        Ok(())
    }

    pub fn set_value(&mut self, row: usize, field: &str, value: Option<f64>) -> Result<()> {
        let pos = self
            .field_position(field)
            .ok_or_else(|| GeoprocessingError::missing_field(&self.name, field))?;
        if let Some(slot) = self.fields[pos].1.get_mut(row) {
            *slot = value;
        }
        Ok(())
    }

    pub fn column(&self, field: &str) -> Result<&[Option<f64>]> {
        self.field_position(field)
            .map(|pos| self.fields[pos].1.as_slice())
            .ok_or_else(|| GeoprocessingError::missing_field(&self.name, field))
    }

    /// Value of `field` for the row keyed `key`.
    pub fn value(&self, key: &str, field: &str) -> Option<f64> {
        self.find(key).and_then(|row| self.row(row).get(field))
    }

    pub fn geometry(&self, row: usize) -> Option<&Polygon<f64>> {
        self.geometry.get(row).and_then(Option::as_ref)
    }

    pub fn row(&self, row: usize) -> RowView<'_> {
        RowView { table: self, row }
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len()).map(move |row| RowView { table: self, row })
    }

    /// First free name for `field`: the name itself, then `field_1`, `field_2`, ...
    pub fn unique_field_name(&self, field: &str) -> String {
        if !self.has_field(field) && field != self.key_field {
            return field.to_string();
        }
        (1..)
            .map(|n| format!("{}_{}", field, n))
            .find(|candidate| !self.has_field(candidate))
            .unwrap_or_else(|| field.to_string())
    }

    /// Left join `fields` of `other` onto this table by key.
    ///
    /// Rows without a match receive nulls. A field whose name already
    /// exists here is added under a suffixed name (`SUM` then `SUM_1`).
    /// Returns the names the joined fields were stored under.
    pub fn join_field(&mut self, other: &FeatureTable, fields: &[&str]) -> Result<Vec<String>> {
        let mut assigned = Vec::with_capacity(fields.len());

        for field in fields {
            let source = other.column(field)?;
            let values: Vec<Option<f64>> = self
                .keys
                .iter()
                .map(|key| other.find(key).and_then(|row| source[row]))
                .collect();

            let name = self.unique_field_name(field);
            self.fields.push((name.clone(), values));
            assigned.push(name);
        }

        debug!(
            table = %self.name,
            join_table = %other.name,
            fields = ?assigned,
            "Joined fields"
        );

        Ok(assigned)
    }

    /// Compute `field` for every row with `expression`.
    ///
    /// Expressions return `None` to write null; the usual pattern is to use
    /// `?` on the inputs so nulls propagate.
    pub fn calculate_field<F>(&mut self, field: &str, expression: F) -> Result<()>
    where
        F: Fn(&RowView<'_>) -> Option<f64>,
    {
        let values: Vec<Option<f64>> = self
            .rows()
            .map(|row| expression(&row).filter(|v| v.is_finite()))
            .collect();
        self.set_column(field, values)
    }

    /// Min-max standardize `(input, output)` field pairs into the given range.
    pub fn standardize_fields(
        &mut self,
        fields: &[(&str, &str)],
        method: &Standardization,
    ) -> Result<()> {
        for (input, output) in fields {
            let scaled = standardize_values(self.column(input)?, method)?;
            self.set_column(output, scaled)?;
        }
        Ok(())
    }

    /// Rows whose `field` satisfies `predicate`, in table order.
    pub fn filter_rows<F>(&self, field: &str, predicate: F) -> Result<Vec<RowView<'_>>>
    where
        F: Fn(f64) -> bool,
    {
        let column = self.column(field)?;
        Ok(self
            .rows()
            .filter(|row| column[row.index()].map_or(false, &predicate))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> FeatureTable {
        let mut table = FeatureTable::new("zones", "GRID_ID");
        for key in ["A-1", "A-2", "B-1"] {
            table.insert(key, None).unwrap();
        }
        table
    }

    #[test]
    fn test_insert_rejects_duplicate_key() {
        let mut table = zones();
        assert!(matches!(
            table.insert("A-1", None),
            Err(GeoprocessingError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_new_rows_get_null_fields() {
        let mut table = FeatureTable::new("t", "GRID_ID");
        table.add_field("SUM");
        table.insert("A-1", None).unwrap();
        assert_eq!(table.column("SUM").unwrap(), &[None]);
    }

    #[test]
    fn test_join_field_left_join_and_suffix() {
        let mut target = zones();
        target.add_field("SUM");

        let mut stats = FeatureTable::new("stats", "GRID_ID");
        stats.add_field("SUM");
        let row = stats.insert("A-2", None).unwrap();
        stats.set_value(row, "SUM", Some(12.0)).unwrap();

        let names = target.join_field(&stats, &["SUM"]).unwrap();
        assert_eq!(names, vec!["SUM_1".to_string()]);
        assert_eq!(target.value("A-2", "SUM_1"), Some(12.0));
        assert_eq!(target.value("A-1", "SUM_1"), None);

        let names = target.join_field(&stats, &["SUM"]).unwrap();
        assert_eq!(names, vec!["SUM_2".to_string()]);
    }

    #[test]
    fn test_join_missing_field() {
        let mut target = zones();
        let stats = FeatureTable::new("stats", "GRID_ID");
        assert!(matches!(
            target.join_field(&stats, &["MAX"]),
            Err(GeoprocessingError::MissingField { .. })
        ));
    }

    #[test]
    fn test_calculate_field_propagates_null() {
        let mut table = zones();
        table
            .set_column("SUM", vec![Some(5.0), None, Some(0.0)])
            .unwrap();
        table
            .set_column("COUNT", vec![Some(10.0), Some(4.0), Some(0.0)])
            .unwrap();

        table
            .calculate_field("PCT", |r| Some(r.get("SUM")? / r.get("COUNT")? * 100.0))
            .unwrap();

        // 0/0 is NaN and is stored as null
        assert_eq!(table.column("PCT").unwrap(), &[Some(50.0), None, None]);
    }

    #[test]
    fn test_filter_rows() {
        let mut table = zones();
        table
            .set_column("HRI", vec![Some(8.0), Some(3.0), None])
            .unwrap();
        let hot: Vec<&str> = table
            .filter_rows("HRI", |v| v > 7.0)
            .unwrap()
            .iter()
            .map(|r| r.key())
            .collect();
        assert_eq!(hot, vec!["A-1"]);
    }
}
