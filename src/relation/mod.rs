use crate::common::codec::CodecError;
use thiserror::Error;

pub mod column;
pub mod record;
pub mod schema;
pub mod types;

pub use column::Column;
pub use record::{Key, Record};
pub use schema::Schema;
pub use types::{DataType, Decimal, Value};

/// Custom error types for schemas, records, and values.
#[derive(Debug, Error)]
pub enum RelationError {
    /// Error to be thrown when two values of incompatible types are compared.
    #[error("cannot compare a value of type {left} with a value of type {right}")]
    TypeMismatch { left: String, right: String },

    /// Error to be thrown when a record's value count does not match its schema.
    #[error("record has {actual} values but the schema defines {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    /// Error to be thrown when a value's type does not match its column.
    #[error("value for column '{column}' has type {actual} but the column is {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// Error to be thrown when a null value is bound to a non-nullable column.
    #[error("null value in non-nullable column '{0}'")]
    NullViolation(String),

    /// Error to be thrown when a variable-length value exceeds its column's limit.
    #[error("value for column '{column}' is {actual} bytes, exceeding the maximum of {max_length}")]
    ValueTooLarge {
        column: String,
        max_length: u32,
        actual: usize,
    },

    /// Error to be thrown when a schema is queried for a column it does not define.
    #[error("schema does not define a column named '{0}'")]
    UnknownColumn(String),

    /// Error to be thrown when a schema defines no primary key.
    #[error("schema does not define a primary key")]
    MissingPrimaryKey,

    /// Error to be thrown when a stored data-type string cannot be interpreted.
    #[error("unrecognized data type '{0}'")]
    UnknownDataType(String),

    /// Error to be thrown when serialized record bytes cannot be interpreted.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
