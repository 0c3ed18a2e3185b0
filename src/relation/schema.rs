use crate::common::bitmap::bitmap_len;
use crate::relation::column::Column;
use crate::relation::RelationError;

/// A schema defines the structure of a single relation in the database.
///
/// A schema is comprised of columns, which each define details about a single attribute
/// in the relation, plus the ordered set of column positions that make up the primary
/// key. Records are clustered by their primary key in the relation's B+Tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    columns: Vec<Column>,
    primary_key: Vec<usize>,
}

impl Schema {
    /// Create a new schema from a vector of columns and the names of the primary-key
    /// columns in key order.
    pub fn new(columns: Vec<Column>, key_columns: &[&str]) -> Result<Self, RelationError> {
        if key_columns.is_empty() {
            return Err(RelationError::MissingPrimaryKey);
        }
        let mut primary_key = Vec::with_capacity(key_columns.len());
        for name in key_columns {
            let index = columns
                .iter()
                .position(|column| column.name() == *name)
                .ok_or_else(|| RelationError::UnknownColumn(name.to_string()))?;
            primary_key.push(index);
        }
        Ok(Self {
            columns,
            primary_key,
        })
    }

    /// Return the number of columns in this schema.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Return this schema's columns.
    pub fn columns(&self) -> &[Column] {
        self.columns.as_slice()
    }

    /// Return the column at the given position.
    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Return the index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    /// Return the positions of the primary-key columns in key order.
    pub fn primary_key(&self) -> &[usize] {
        self.primary_key.as_slice()
    }

    /// Return the names of the primary-key columns in key order.
    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key
            .iter()
            .map(|&index| self.columns[index].name())
            .collect()
    }

    /// Return the number of bytes occupied by a record's null bitmap.
    pub fn bitmap_len(&self) -> usize {
        bitmap_len(self.columns.len())
    }

    /// Return whether any column stores variable-length values.
    pub fn has_variable_columns(&self) -> bool {
        self.columns
            .iter()
            .any(|column| !column.data_type().is_fixed())
    }

    /// Derive the schema of this relation's keys: the primary-key columns in key order,
    /// all of them forming the derived schema's primary key.
    pub fn key_schema(&self) -> Schema {
        let columns: Vec<Column> = self
            .primary_key
            .iter()
            .map(|&index| self.columns[index].clone())
            .collect();
        let primary_key = (0..columns.len()).collect();
        Schema {
            columns,
            primary_key,
        }
    }
}
