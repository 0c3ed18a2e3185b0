use crate::relation::types::DataType;
use crate::relation::RelationError;

/// A column describes details about a single attribute in a record, such as its name,
/// data type, and whether it can be null. Variable-length columns carry a maximum byte
/// length; decimal columns may carry a precision and scale.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    max_length: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
    default_expression: Option<String>,
}

impl Column {
    pub fn new(name: &str, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable,
            max_length: None,
            precision: None,
            scale: None,
            default_expression: None,
        }
    }

    /// Attach a maximum byte length to a variable-length column.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Attach a precision and scale to a decimal column.
    pub fn with_precision_scale(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Attach a default-value expression.
    pub fn with_default_expression(mut self, expression: &str) -> Self {
        self.default_expression = Some(expression.to_string());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn max_length(&self) -> Option<u32> {
        self.max_length
    }

    pub fn precision(&self) -> Option<u8> {
        self.precision
    }

    pub fn scale(&self) -> Option<u8> {
        self.scale
    }

    pub fn default_expression(&self) -> Option<&str> {
        self.default_expression.as_deref()
    }

    /// Render the column's type the way it is stored in the system catalog, e.g.
    /// "VARCHAR(128)" or "DECIMAL(18,2)".
    pub fn type_string(&self) -> String {
        match (self.data_type, self.max_length, self.precision, self.scale) {
            (DataType::Varchar | DataType::Blob, Some(max_length), _, _) => {
                format!("{}({})", self.data_type, max_length)
            }
            (DataType::Decimal, _, Some(precision), Some(scale)) => {
                format!("{}({},{})", self.data_type, precision, scale)
            }
            _ => self.data_type.to_string(),
        }
    }

    /// Parse a type string produced by `type_string` back into a data type and its
    /// length/precision metadata.
    pub fn parse_type_string(
        type_string: &str,
    ) -> Result<(DataType, Option<u32>, Option<u8>, Option<u8>), RelationError> {
        let unknown = || RelationError::UnknownDataType(type_string.to_string());
        let (name, args) = match type_string.find('(') {
            Some(open) => {
                let close = type_string.rfind(')').ok_or_else(unknown)?;
                (
                    &type_string[..open],
                    Some(&type_string[open + 1..close]),
                )
            }
            None => (type_string, None),
        };

        match name {
            "INT" => Ok((DataType::Int, None, None, None)),
            "BIGINT" => Ok((DataType::BigInt, None, None, None)),
            "FLOAT" => Ok((DataType::Float, None, None, None)),
            "BOOLEAN" => Ok((DataType::Boolean, None, None, None)),
            "DATETIME" => Ok((DataType::DateTime, None, None, None)),
            "DECIMAL" => match args {
                Some(args) => {
                    let (precision, scale) = args.split_once(',').ok_or_else(unknown)?;
                    let precision = precision.trim().parse().map_err(|_| unknown())?;
                    let scale = scale.trim().parse().map_err(|_| unknown())?;
                    Ok((DataType::Decimal, None, Some(precision), Some(scale)))
                }
                None => Ok((DataType::Decimal, None, None, None)),
            },
            "VARCHAR" | "BLOB" => {
                let data_type = match name {
                    "VARCHAR" => DataType::Varchar,
                    _ => DataType::Blob,
                };
                let max_length = match args {
                    Some(args) => Some(args.trim().parse().map_err(|_| unknown())?),
                    None => None,
                };
                Ok((data_type, max_length, None, None))
            }
            _ => Err(unknown()),
        }
    }

    /// Reconstruct a column from its catalog representation.
    pub fn from_catalog(
        name: &str,
        type_string: &str,
        nullable: bool,
        default_expression: Option<&str>,
    ) -> Result<Self, RelationError> {
        let (data_type, max_length, precision, scale) = Self::parse_type_string(type_string)?;
        Ok(Self {
            name: name.to_string(),
            data_type,
            nullable,
            max_length,
            precision,
            scale,
            default_expression: default_expression.map(str::to_string),
        })
    }
}
