use crate::common::bitmap::{get_bit, set_bit};
use crate::common::codec;
use crate::relation::schema::Schema;
use crate::relation::types::{DataType, Decimal, Value};
use crate::relation::RelationError;

use std::cmp::Ordering;

use chrono::DateTime;

/// A database record with variable-length attributes.
///
/// The initial section of a serialized record contains a null bitmap which flags the
/// attributes that are null and consume no further bytes.
///
/// The next section contains the encodings of every non-null fixed-length value in
/// schema order. Numerics, booleans, datetimes and decimals are encoded as-is in
/// little-endian form.
///
/// The final section contains every non-null variable-length value in schema order,
/// each prefixed with its length.
///
/// Data format:
/// ------------------------------------------------------------
///  NULL BITMAP | FIXED-LENGTH VALUES | VARIABLE-LENGTH VALUES
/// ------------------------------------------------------------
///
/// Metadata regarding a record's schema is stored in the system catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        self.values.as_slice()
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// A record's primary key: the key-column values in key order. Keys order
/// lexicographically, with each component compared in its type's natural order and nulls
/// sorting before any non-null value.
#[derive(Clone, Debug, PartialEq)]
pub struct Key {
    values: Vec<Value>,
}

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        self.values.as_slice()
    }

    /// Compare two keys of the same shape component-wise.
    pub fn compare(&self, other: &Key) -> Result<Ordering, RelationError> {
        if self.values.len() != other.values.len() {
            return Err(RelationError::ArityMismatch {
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }
        for (left, right) in self.values.iter().zip(other.values.iter()) {
            match left.compare(right)? {
                Ordering::Equal => continue,
                ordering => return Ok(ordering),
            }
        }
        Ok(Ordering::Equal)
    }
}

/// Check that a value may be bound to the given column.
fn validate_value(value: &Value, column: &crate::relation::column::Column) -> Result<(), RelationError> {
    match value {
        Value::Null => {
            if !column.is_nullable() {
                return Err(RelationError::NullViolation(column.name().to_string()));
            }
        }
        _ => {
            let actual = value.data_type().unwrap_or(DataType::Int);
            if actual != column.data_type() {
                return Err(RelationError::ColumnTypeMismatch {
                    column: column.name().to_string(),
                    expected: column.data_type().to_string(),
                    actual: actual.to_string(),
                });
            }
            if let Some(max_length) = column.max_length() {
                let len = match value {
                    Value::Varchar(s) => s.len(),
                    Value::Blob(b) => b.len(),
                    _ => 0,
                };
                if len > max_length as usize {
                    return Err(RelationError::ValueTooLarge {
                        column: column.name().to_string(),
                        max_length,
                        actual: len,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Serialize a record according to its schema.
pub fn serialize(record: &Record, schema: &Schema) -> Result<Vec<u8>, RelationError> {
    if record.values().len() != schema.len() {
        return Err(RelationError::ArityMismatch {
            expected: schema.len(),
            actual: record.values().len(),
        });
    }
    for (value, column) in record.values().iter().zip(schema.columns()) {
        validate_value(value, column)?;
    }

    let mut bytes = vec![0u8; schema.bitmap_len()];
    for (i, value) in record.values().iter().enumerate() {
        if value.is_null() {
            set_bit(&mut bytes, i).expect("bitmap sized from schema");
        }
    }

    // Fixed-length block.
    for (value, column) in record.values().iter().zip(schema.columns()) {
        if value.is_null() || !column.data_type().is_fixed() {
            continue;
        }
        match value {
            Value::Int(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            Value::BigInt(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            Value::Float(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            Value::Boolean(v) => bytes.push(*v as u8),
            Value::DateTime(v) => bytes.extend_from_slice(&v.timestamp_micros().to_le_bytes()),
            Value::Decimal(v) => {
                bytes.extend_from_slice(&v.lo.to_le_bytes());
                bytes.extend_from_slice(&v.mid.to_le_bytes());
                bytes.extend_from_slice(&v.hi.to_le_bytes());
                bytes.extend_from_slice(&v.flags.to_le_bytes());
            }
            Value::Null | Value::Varchar(_) | Value::Blob(_) => unreachable!(),
        }
    }

    // Variable-length block.
    for (value, column) in record.values().iter().zip(schema.columns()) {
        if value.is_null() || column.data_type().is_fixed() {
            continue;
        }
        let payload: &[u8] = match value {
            Value::Varchar(s) => s.as_bytes(),
            Value::Blob(b) => b.as_slice(),
            _ => unreachable!(),
        };
        bytes.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        bytes.extend_from_slice(payload);
    }

    Ok(bytes)
}

/// Deserialize a record according to its schema. Trailing bytes beyond what the schema
/// demands are ignored.
pub fn deserialize(bytes: &[u8], schema: &Schema) -> Result<Record, RelationError> {
    let bitmap_len = schema.bitmap_len();
    if bytes.len() < bitmap_len {
        return Err(RelationError::CorruptRecord(
            "missing null bitmap".to_string(),
        ));
    }
    let bitmap = &bytes[..bitmap_len];
    let mut values = vec![Value::Null; schema.len()];
    let mut offset = bitmap_len;

    // Fixed-length block.
    for (i, column) in schema.columns().iter().enumerate() {
        let is_null = get_bit(bitmap, i).expect("bitmap sized from schema");
        if is_null && column.is_nullable() {
            continue;
        }
        let Some(size) = column.data_type().fixed_size() else {
            continue;
        };
        values[i] = match column.data_type() {
            DataType::Int => Value::Int(codec::read_i32(bytes, offset)?),
            DataType::BigInt => Value::BigInt(codec::read_i64(bytes, offset)?),
            DataType::Float => Value::Float(codec::read_f64(bytes, offset)?),
            DataType::Boolean => Value::Boolean(codec::read_bool(bytes, offset)?),
            DataType::DateTime => {
                let micros = codec::read_i64(bytes, offset)?;
                let datetime = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                    RelationError::CorruptRecord(format!(
                        "datetime value {} is out of range",
                        micros
                    ))
                })?;
                Value::DateTime(datetime)
            }
            DataType::Decimal => Value::Decimal(Decimal::new(
                codec::read_i32(bytes, offset)?,
                codec::read_i32(bytes, offset + 4)?,
                codec::read_i32(bytes, offset + 8)?,
                codec::read_i32(bytes, offset + 12)?,
            )),
            DataType::Varchar | DataType::Blob => unreachable!(),
        };
        offset += size;
    }

    // Variable-length block.
    for (i, column) in schema.columns().iter().enumerate() {
        if column.data_type().is_fixed() {
            continue;
        }
        let is_null = get_bit(bitmap, i).expect("bitmap sized from schema");
        if is_null && column.is_nullable() {
            continue;
        }
        let len = codec::read_i32(bytes, offset)?;
        if len < 0 {
            return Err(RelationError::CorruptRecord(format!(
                "negative length {} for column '{}'",
                len,
                column.name()
            )));
        }
        offset += 4;
        let payload = codec::read_bytes(bytes, offset, len as usize)?;
        offset += len as usize;
        values[i] = match column.data_type() {
            DataType::Varchar => Value::Varchar(String::from_utf8(payload.to_vec()).map_err(
                |_| {
                    RelationError::CorruptRecord(format!(
                        "column '{}' is not valid UTF-8",
                        column.name()
                    ))
                },
            )?),
            DataType::Blob => Value::Blob(payload.to_vec()),
            _ => unreachable!(),
        };
    }

    Ok(Record::new(values))
}

/// Project a record's primary key according to its schema.
pub fn primary_key(record: &Record, schema: &Schema) -> Result<Key, RelationError> {
    if record.values().len() != schema.len() {
        return Err(RelationError::ArityMismatch {
            expected: schema.len(),
            actual: record.values().len(),
        });
    }
    let values = schema
        .primary_key()
        .iter()
        .map(|&index| record.value(index).clone())
        .collect();
    Ok(Key::new(values))
}

/// Decode the primary key directly from a serialized record.
pub fn decode_key(bytes: &[u8], schema: &Schema) -> Result<Key, RelationError> {
    let record = deserialize(bytes, schema)?;
    primary_key(&record, schema)
}

/// Serialize a key using the relation's key schema.
pub fn serialize_key(key: &Key, key_schema: &Schema) -> Result<Vec<u8>, RelationError> {
    serialize(&Record::new(key.values().to_vec()), key_schema)
}

/// Deserialize a key using the relation's key schema. Trailing bytes are ignored, which
/// lets internal-node entries append child pointers to the key payload.
pub fn deserialize_key(bytes: &[u8], key_schema: &Schema) -> Result<Key, RelationError> {
    let record = deserialize(bytes, key_schema)?;
    Ok(Key::new(record.values().to_vec()))
}
