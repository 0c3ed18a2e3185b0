//! Definitions of the self-describing system catalog: the four relations that record
//! every database, table, column and constraint, themselves included.

use crate::common::TableIdT;
use crate::relation::{Column, DataType, Schema};

/// Fixed IDs for the catalog relations. User tables are assigned IDs starting at
/// USER_TABLES_START.
pub const SYS_DATABASES_TABLE_ID: TableIdT = 1;
pub const SYS_TABLES_TABLE_ID: TableIdT = 2;
pub const SYS_COLUMNS_TABLE_ID: TableIdT = 3;
pub const SYS_CONSTRAINTS_TABLE_ID: TableIdT = 4;
pub const USER_TABLES_START: TableIdT = 100;

pub const SYS_DATABASES: &str = "sys_databases";
pub const SYS_TABLES: &str = "sys_tables";
pub const SYS_COLUMNS: &str = "sys_columns";
pub const SYS_CONSTRAINTS: &str = "sys_constraints";

/// The built-in database that owns the catalog relations.
pub const SYSTEM_DATABASE_ID: i32 = 1;
pub const SYSTEM_DATABASE_NAME: &str = "System";

/// Constraint-type tag for primary keys.
pub const PRIMARY_KEY_CONSTRAINT_TYPE: &str = "PK";

/// The catalog tables in bootstrap order with their fixed IDs and schemas.
pub fn catalog_tables() -> [(TableIdT, &'static str, Schema); 4] {
    [
        (SYS_DATABASES_TABLE_ID, SYS_DATABASES, sys_databases_schema()),
        (SYS_TABLES_TABLE_ID, SYS_TABLES, sys_tables_schema()),
        (SYS_COLUMNS_TABLE_ID, SYS_COLUMNS, sys_columns_schema()),
        (
            SYS_CONSTRAINTS_TABLE_ID,
            SYS_CONSTRAINTS,
            sys_constraints_schema(),
        ),
    ]
}

pub fn sys_databases_schema() -> Schema {
    Schema::new(
        vec![
            Column::new("database_id", DataType::Int, false),
            Column::new("database_name", DataType::Varchar, false).with_max_length(128),
            Column::new("creation_date", DataType::DateTime, false),
        ],
        &["database_id"],
    )
    .expect("catalog schema is well-formed")
}

pub fn sys_tables_schema() -> Schema {
    Schema::new(
        vec![
            Column::new("table_id", DataType::Int, false),
            Column::new("database_id", DataType::Int, false),
            Column::new("table_name", DataType::Varchar, false).with_max_length(128),
            Column::new("creation_date", DataType::DateTime, false),
        ],
        &["table_id"],
    )
    .expect("catalog schema is well-formed")
}

pub fn sys_columns_schema() -> Schema {
    Schema::new(
        vec![
            Column::new("column_id", DataType::Int, false),
            Column::new("table_id", DataType::Int, false),
            Column::new("column_name", DataType::Varchar, false).with_max_length(128),
            Column::new("data_type", DataType::Varchar, false).with_max_length(512),
            Column::new("ordinal_position", DataType::Int, false),
            Column::new("is_nullable", DataType::Boolean, false),
            Column::new("default_value_expression", DataType::Varchar, true).with_max_length(1024),
        ],
        &["column_id"],
    )
    .expect("catalog schema is well-formed")
}

pub fn sys_constraints_schema() -> Schema {
    Schema::new(
        vec![
            Column::new("constraint_id", DataType::Int, false),
            Column::new("table_id", DataType::Int, false),
            Column::new("constraint_name", DataType::Varchar, false).with_max_length(128),
            Column::new("constraint_type", DataType::Varchar, false).with_max_length(16),
            Column::new("definition", DataType::Varchar, true).with_max_length(2048),
            Column::new("creation_date", DataType::DateTime, false),
        ],
        &["constraint_id"],
    )
    .expect("catalog schema is well-formed")
}

/// Render a schema's primary key the way it is stored in a constraint row, e.g.
/// "PRIMARY KEY (id, name)".
pub fn primary_key_definition(schema: &Schema) -> String {
    format!("PRIMARY KEY ({})", schema.primary_key_names().join(", "))
}

/// Recover the primary-key column names from a stored constraint definition.
pub fn parse_primary_key_definition(definition: &str) -> Option<Vec<String>> {
    let inner = definition
        .strip_prefix("PRIMARY KEY (")?
        .strip_suffix(')')?;
    Some(
        inner
            .split(',')
            .map(|name| name.trim().to_string())
            .collect(),
    )
}
