use crate::buffer::{BufferError, BufferPoolManager};
use crate::common::{PageId, TableIdT};
use crate::disk::{DiskError, DiskManager};
use crate::engine::catalog::{
    catalog_tables, parse_primary_key_definition, primary_key_definition, PRIMARY_KEY_CONSTRAINT_TYPE,
    SYSTEM_DATABASE_ID, SYSTEM_DATABASE_NAME, SYS_COLUMNS, SYS_CONSTRAINTS, SYS_DATABASES,
    SYS_DATABASES_TABLE_ID, SYS_TABLES, USER_TABLES_START,
};
use crate::index::{BTree, IndexError, RangeScan};
use crate::relation::record::{Key, Record};
use crate::relation::{Column, RelationError, Schema, Value};

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

pub mod catalog;

/// Number of stripes in the lock set that serializes writes per table name.
const TABLE_STRIPE_COUNT: usize = 1024;

/// Default number of buffer-pool frames.
pub const DEFAULT_POOL_SIZE: usize = 256;

/// Configuration for a storage engine instance.
pub struct StorageEngineConfig {
    /// Directory holding one file per table.
    pub data_dir: PathBuf,

    /// Number of pages the buffer pool caches in memory.
    pub pool_size: usize,
}

impl StorageEngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// A registered table: its schema and the B+Tree that stores its rows.
struct TableHandle {
    schema: Arc<Schema>,
    tree: BTree,
}

/// The storage engine maintains the mapping from table names to B+Trees and the
/// self-describing system catalog that persists it.
///
/// On startup the engine either bootstraps the four catalog relations
/// (`sys_databases`, `sys_tables`, `sys_columns`, `sys_constraints`) and registers
/// their own metadata, or reopens them from disk and restores its ID counters from the
/// stored rows. Writes on the same table are serialized through a striped set of
/// mutexes keyed by table name, standing in for page latching inside the tree.
pub struct StorageEngine {
    buffer_manager: Arc<BufferPoolManager>,

    /// Mapping of table names to open table handles.
    tables: RwLock<HashMap<String, Arc<TableHandle>>>,

    /// Striped mutexes serializing writes per table name.
    table_stripes: Vec<Mutex<()>>,

    next_database_id: AtomicI32,
    next_table_id: AtomicI32,
    next_column_id: AtomicI32,
    next_constraint_id: AtomicI32,
}

impl StorageEngine {
    /// Open a storage engine over the given data directory, bootstrapping the system
    /// catalog on first use.
    pub fn open(config: StorageEngineConfig) -> Result<Self, EngineError> {
        let disk_manager = DiskManager::new(&config.data_dir)?;
        let buffer_manager = Arc::new(BufferPoolManager::new(config.pool_size, disk_manager));

        let engine = Self {
            buffer_manager,
            tables: RwLock::new(HashMap::new()),
            table_stripes: (0..TABLE_STRIPE_COUNT).map(|_| Mutex::new(())).collect(),
            next_database_id: AtomicI32::new(SYSTEM_DATABASE_ID + 1),
            next_table_id: AtomicI32::new(USER_TABLES_START),
            next_column_id: AtomicI32::new(1),
            next_constraint_id: AtomicI32::new(1),
        };

        match engine.system_catalog_exists()? {
            true => engine.open_catalog()?,
            false => engine.bootstrap_catalog()?,
        }
        Ok(engine)
    }

    /// Probe the disk for the system catalog by fetching the header page of
    /// `sys_databases`.
    fn system_catalog_exists(&self) -> Result<bool, EngineError> {
        match self
            .buffer_manager
            .fetch_page(PageId::table_header(SYS_DATABASES_TABLE_ID))
        {
            Ok(_guard) => Ok(true),
            Err(BufferError::CouldNotLoadPage {
                source: DiskError::TableFileNotFound(_),
                ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the catalog relations in a fixed order and register their own metadata.
    fn bootstrap_catalog(&self) -> Result<(), EngineError> {
        for (table_id, name, schema) in catalog_tables() {
            let schema = Arc::new(schema);
            let tree = BTree::create(self.buffer_manager.clone(), schema.clone(), table_id)?;
            self.cache_handle(name, TableHandle { schema, tree });
        }

        self.insert_catalog_row(
            SYS_DATABASES,
            Record::new(vec![
                Value::Int(SYSTEM_DATABASE_ID),
                Value::Varchar(SYSTEM_DATABASE_NAME.to_string()),
                Value::DateTime(Utc::now()),
            ]),
        )?;

        for (table_id, name, schema) in catalog_tables() {
            self.register_table_metadata(SYSTEM_DATABASE_ID, table_id, name, &schema)?;
        }

        info!("bootstrapped system catalog");
        Ok(())
    }

    /// Reopen the catalog relations from disk and restore the ID counters from the
    /// stored rows.
    fn open_catalog(&self) -> Result<(), EngineError> {
        for (table_id, name, schema) in catalog_tables() {
            let schema = Arc::new(schema);
            let tree = BTree::open(self.buffer_manager.clone(), schema.clone(), table_id)?;
            self.cache_handle(name, TableHandle { schema, tree });
        }

        let max_database_id = self.max_int_in_column(SYS_DATABASES, 0)?;
        let max_table_id = self.max_int_in_column(SYS_TABLES, 0)?;
        let max_column_id = self.max_int_in_column(SYS_COLUMNS, 0)?;
        let max_constraint_id = self.max_int_in_column(SYS_CONSTRAINTS, 0)?;

        self.next_database_id
            .store(max_database_id.max(SYSTEM_DATABASE_ID) + 1, Ordering::SeqCst);
        self.next_table_id
            .store((max_table_id + 1).max(USER_TABLES_START), Ordering::SeqCst);
        self.next_column_id
            .store(max_column_id + 1, Ordering::SeqCst);
        self.next_constraint_id
            .store(max_constraint_id + 1, Ordering::SeqCst);

        info!("opened existing system catalog");
        Ok(())
    }

    /// Scan a catalog relation and return the greatest integer in the given column.
    fn max_int_in_column(&self, table_name: &str, index: usize) -> Result<i32, EngineError> {
        let handle = self.catalog_handle(table_name)?;
        let mut max = 0;
        for result in handle.tree.scan(None, true, None, true)? {
            let row = result?;
            max = max.max(value_as_int(row.value(index))?);
        }
        Ok(max)
    }

    /// Create a new database and return its ID.
    pub fn create_database(&self, name: &str) -> Result<i32, EngineError> {
        let _stripes = self.lock_stripes(&[SYS_DATABASES]);

        let handle = self.catalog_handle(SYS_DATABASES)?;
        let existing = handle
            .tree
            .scan_column("database_name", &Value::Varchar(name.to_string()))?;
        if !existing.is_empty() {
            return Err(EngineError::DuplicateDatabase(name.to_string()));
        }

        let database_id = self.next_database_id.fetch_add(1, Ordering::SeqCst);
        handle.tree.insert(&Record::new(vec![
            Value::Int(database_id),
            Value::Varchar(name.to_string()),
            Value::DateTime(Utc::now()),
        ]))?;
        Ok(database_id)
    }

    /// Create a new table in the given database: a fresh B+Tree plus catalog rows for
    /// the table, its columns, and its primary-key constraint.
    pub fn create_table(
        &self,
        database_id: i32,
        name: &str,
        schema: Schema,
    ) -> Result<(), EngineError> {
        let _stripes = self.lock_stripes(&[name, SYS_TABLES, SYS_COLUMNS, SYS_CONSTRAINTS]);

        if self.cached_handle(name).is_some() || self.lookup_table_row(name)?.is_some() {
            return Err(EngineError::DuplicateTable(name.to_string()));
        }

        let table_id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let schema = Arc::new(schema);
        let tree = BTree::create(self.buffer_manager.clone(), schema.clone(), table_id)?;
        self.register_table_metadata(database_id, table_id, name, &schema)?;
        self.cache_handle(name, TableHandle { schema, tree });
        info!(table = name, table_id, "created table");
        Ok(())
    }

    /// Write a table's row into `sys_tables` and its columns and primary-key
    /// constraint into `sys_columns` and `sys_constraints`.
    fn register_table_metadata(
        &self,
        database_id: i32,
        table_id: TableIdT,
        name: &str,
        schema: &Schema,
    ) -> Result<(), EngineError> {
        let now = Utc::now();
        self.insert_catalog_row(
            SYS_TABLES,
            Record::new(vec![
                Value::Int(table_id),
                Value::Int(database_id),
                Value::Varchar(name.to_string()),
                Value::DateTime(now),
            ]),
        )?;

        for (ordinal, column) in schema.columns().iter().enumerate() {
            let column_id = self.next_column_id.fetch_add(1, Ordering::SeqCst);
            self.insert_catalog_row(
                SYS_COLUMNS,
                Record::new(vec![
                    Value::Int(column_id),
                    Value::Int(table_id),
                    Value::Varchar(column.name().to_string()),
                    Value::Varchar(column.type_string()),
                    Value::Int(ordinal as i32),
                    Value::Boolean(column.is_nullable()),
                    match column.default_expression() {
                        Some(expression) => Value::Varchar(expression.to_string()),
                        None => Value::Null,
                    },
                ]),
            )?;
        }

        let constraint_id = self.next_constraint_id.fetch_add(1, Ordering::SeqCst);
        self.insert_catalog_row(
            SYS_CONSTRAINTS,
            Record::new(vec![
                Value::Int(constraint_id),
                Value::Int(table_id),
                Value::Varchar(format!("PK_{}", name)),
                Value::Varchar(PRIMARY_KEY_CONSTRAINT_TYPE.to_string()),
                Value::Varchar(primary_key_definition(schema)),
                Value::DateTime(now),
            ]),
        )?;
        Ok(())
    }

    /// Return the schema of the named table, consulting the in-memory cache first and
    /// the catalog relations on a miss.
    pub fn get_table_definition(&self, name: &str) -> Result<Option<Arc<Schema>>, EngineError> {
        Ok(self.table_handle(name)?.map(|handle| handle.schema.clone()))
    }

    /// Insert a row into the named table.
    pub fn insert_row(&self, name: &str, row: &Record) -> Result<(), EngineError> {
        let handle = self
            .table_handle(name)?
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))?;
        let _stripes = self.lock_stripes(&[name]);
        handle.tree.insert(row)?;
        Ok(())
    }

    /// Overwrite an existing row in the named table, matched by primary key.
    pub fn update_row(&self, name: &str, row: &Record) -> Result<(), EngineError> {
        let handle = self
            .table_handle(name)?
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))?;
        let _stripes = self.lock_stripes(&[name]);
        handle.tree.update(row)?;
        Ok(())
    }

    /// Scan the named table in primary-key order between the optional bounds.
    pub fn scan(
        &self,
        name: &str,
        min: Option<Key>,
        min_inclusive: bool,
        max: Option<Key>,
        max_inclusive: bool,
    ) -> Result<RangeScan, EngineError> {
        let handle = self
            .table_handle(name)?
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))?;
        Ok(handle.tree.scan(min, min_inclusive, max, max_inclusive)?)
    }

    /// Flush all dirty pages out to disk.
    pub fn dispose(&self) {
        self.buffer_manager.dispose();
    }

    /// Return the table's handle, loading it from the catalog if it is not cached.
    fn table_handle(&self, name: &str) -> Result<Option<Arc<TableHandle>>, EngineError> {
        if let Some(handle) = self.cached_handle(name) {
            return Ok(Some(handle));
        }
        self.load_table_handle(name)
    }

    /// Rebuild a table handle from the catalog relations: its row in `sys_tables`, its
    /// columns from `sys_columns` ordered by ordinal position, and its primary key from
    /// `sys_constraints`.
    fn load_table_handle(&self, name: &str) -> Result<Option<Arc<TableHandle>>, EngineError> {
        let Some(table_row) = self.lookup_table_row(name)? else {
            return Ok(None);
        };
        let table_id = value_as_int(table_row.value(0))?;

        let columns_handle = self.catalog_handle(SYS_COLUMNS)?;
        let mut column_rows = columns_handle
            .tree
            .scan_column("table_id", &Value::Int(table_id))?;
        if column_rows.is_empty() {
            return Err(EngineError::CatalogCorrupt(format!(
                "table '{}' has no rows in {}",
                name, SYS_COLUMNS
            )));
        }
        column_rows.sort_by_key(|row| value_as_int(row.value(4)).unwrap_or(i32::MAX));

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            columns.push(Column::from_catalog(
                value_as_str(row.value(2))?,
                value_as_str(row.value(3))?,
                value_as_bool(row.value(5))?,
                value_as_opt_str(row.value(6))?,
            )?);
        }

        let constraints_handle = self.catalog_handle(SYS_CONSTRAINTS)?;
        let constraint_rows = constraints_handle
            .tree
            .scan_column("table_id", &Value::Int(table_id))?;
        let key_columns = constraint_rows
            .iter()
            .find(|row| {
                value_as_str(row.value(3))
                    .map_or(false, |t| t == PRIMARY_KEY_CONSTRAINT_TYPE)
            })
            .and_then(|row| value_as_opt_str(row.value(4)).ok().flatten())
            .and_then(parse_primary_key_definition)
            .ok_or_else(|| {
                EngineError::CatalogCorrupt(format!(
                    "table '{}' has no primary-key constraint",
                    name
                ))
            })?;
        let key_column_refs: Vec<&str> = key_columns.iter().map(String::as_str).collect();

        let schema = Arc::new(Schema::new(columns, &key_column_refs)?);
        let tree = BTree::open(self.buffer_manager.clone(), schema.clone(), table_id)?;
        let handle = self.cache_handle(name, TableHandle { schema, tree });
        Ok(Some(handle))
    }

    /// Return the table's row in `sys_tables`, if any.
    fn lookup_table_row(&self, name: &str) -> Result<Option<Record>, EngineError> {
        let handle = self.catalog_handle(SYS_TABLES)?;
        let rows = handle
            .tree
            .scan_column("table_name", &Value::Varchar(name.to_string()))?;
        Ok(rows.into_iter().next())
    }

    fn insert_catalog_row(&self, table_name: &str, row: Record) -> Result<(), EngineError> {
        self.catalog_handle(table_name)?.tree.insert(&row)?;
        Ok(())
    }

    fn catalog_handle(&self, table_name: &str) -> Result<Arc<TableHandle>, EngineError> {
        self.cached_handle(table_name).ok_or_else(|| {
            EngineError::CatalogCorrupt(format!("catalog table '{}' is not open", table_name))
        })
    }

    fn cached_handle(&self, name: &str) -> Option<Arc<TableHandle>> {
        self.tables.read().unwrap().get(name).cloned()
    }

    fn cache_handle(&self, name: &str, handle: TableHandle) -> Arc<TableHandle> {
        let handle = Arc::new(handle);
        self.tables
            .write()
            .unwrap()
            .insert(name.to_string(), handle.clone());
        handle
    }

    /// Acquire the stripes for the given table names in a deadlock-free order.
    fn lock_stripes(&self, names: &[&str]) -> Vec<MutexGuard<'_, ()>> {
        let mut indices: Vec<usize> = names.iter().map(|name| stripe_index(name)).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .map(|index| self.table_stripes[index].lock().unwrap())
            .collect()
    }
}

fn stripe_index(name: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish() as usize % TABLE_STRIPE_COUNT
}

fn value_as_int(value: &Value) -> Result<i32, EngineError> {
    match value {
        Value::Int(v) => Ok(*v),
        other => Err(EngineError::CatalogCorrupt(format!(
            "expected an INT catalog value, found {:?}",
            other
        ))),
    }
}

fn value_as_str(value: &Value) -> Result<&str, EngineError> {
    match value {
        Value::Varchar(v) => Ok(v.as_str()),
        other => Err(EngineError::CatalogCorrupt(format!(
            "expected a VARCHAR catalog value, found {:?}",
            other
        ))),
    }
}

fn value_as_opt_str(value: &Value) -> Result<Option<&str>, EngineError> {
    match value {
        Value::Null => Ok(None),
        Value::Varchar(v) => Ok(Some(v.as_str())),
        other => Err(EngineError::CatalogCorrupt(format!(
            "expected a nullable VARCHAR catalog value, found {:?}",
            other
        ))),
    }
}

fn value_as_bool(value: &Value) -> Result<bool, EngineError> {
    match value {
        Value::Boolean(v) => Ok(*v),
        other => Err(EngineError::CatalogCorrupt(format!(
            "expected a BOOLEAN catalog value, found {:?}",
            other
        ))),
    }
}

/// Custom error types to be used by the storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Error to be thrown when a table is created with a name that is already taken.
    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    /// Error to be thrown when an operation targets a table the catalog does not know.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// Error to be thrown when a database is created with a name that is already taken.
    #[error("database '{0}' already exists")]
    DuplicateDatabase(String),

    /// Error to be thrown when the stored catalog rows contradict themselves.
    #[error("system catalog is inconsistent: {0}")]
    CatalogCorrupt(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Relation(#[from] RelationError),

    #[error(transparent)]
    Disk(#[from] DiskError),
}
