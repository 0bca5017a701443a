use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::ident::quote_identifier;
use super::manager::DatabaseError;

/// Every user-owned table carries this column; reads and writes are scoped by it.
pub const OWNER_COLUMN: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name as reported by `information_schema.columns.udt_name`.
    pub udt_name: String,
    pub nullable: bool,
    pub has_default: bool,
}

impl ColumnInfo {
    pub fn new(name: &str, udt_name: &str) -> Self {
        Self {
            name: name.to_string(),
            udt_name: udt_name.to_string(),
            nullable: true,
            has_default: false,
        }
    }

    /// Placeholder with a cast to this column's type, e.g. `$3::"int8"`.
    pub fn cast_param(&self, index: usize) -> String {
        format!("${}::{}", index, quote_identifier(&self.udt_name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    pub unique_keys: Vec<Vec<String>>,
}

impl TableSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn owner_column(&self) -> Option<&ColumnInfo> {
        self.column(OWNER_COLUMN)
    }

    /// The primary key column when the key is a single column.
    pub fn single_primary_key(&self) -> Option<&ColumnInfo> {
        match self.primary_key.as_slice() {
            [only] => self.column(only),
            _ => None,
        }
    }

    /// Candidate `ON CONFLICT` targets in preference order: unique keys, then the primary key.
    pub fn conflict_targets(&self) -> impl Iterator<Item = &[String]> {
        self.unique_keys
            .iter()
            .map(|k| k.as_slice())
            .chain(std::iter::once(self.primary_key.as_slice()))
            .filter(|k| !k.is_empty())
    }

    pub fn quoted_table(&self) -> String {
        quote_identifier(&self.table)
    }
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    column_name: String,
    udt_name: String,
    nullable: bool,
    has_default: bool,
}

#[derive(Debug, FromRow)]
struct KeyRow {
    constraint_name: String,
    constraint_type: String,
    column_name: String,
}

/// Table metadata cached for the life of the process.
///
/// Lookups that fail are not cached, so a transient database error or a table
/// created later by `setup` is picked up on the next request.
#[derive(Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, pool: &PgPool, table: &str) -> Result<Arc<TableSchema>, DatabaseError> {
        {
            let tables = self.tables.read().await;
            if let Some(schema) = tables.get(table) {
                return Ok(schema.clone());
            }
        }

        let schema = Arc::new(fetch_table_schema(pool, table).await?);

        // Two requests may race to populate the same table; both results are identical.
        self.tables
            .write()
            .await
            .insert(table.to_string(), schema.clone());
        debug!(table, columns = schema.columns.len(), "cached table schema");
        Ok(schema)
    }

    pub async fn clear(&self) {
        self.tables.write().await.clear();
    }
}

async fn fetch_table_schema(pool: &PgPool, table: &str) -> Result<TableSchema, DatabaseError> {
    let columns = sqlx::query_as::<_, ColumnRow>(
        r#"
        SELECT column_name::text AS column_name,
               udt_name::text AS udt_name,
               (is_nullable = 'YES') AS nullable,
               (column_default IS NOT NULL) AS has_default
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        error!(table, error = %e, "failed to read column metadata");
        DatabaseError::Sqlx(e)
    })?;

    if columns.is_empty() {
        return Err(DatabaseError::UnknownTable(table.to_string()));
    }

    let keys = sqlx::query_as::<_, KeyRow>(
        r#"
        SELECT tc.constraint_name::text AS constraint_name,
               tc.constraint_type::text AS constraint_type,
               kcu.column_name::text AS column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON kcu.constraint_name = tc.constraint_name
         AND kcu.table_schema = tc.table_schema
         AND kcu.table_name = tc.table_name
        WHERE tc.table_schema = current_schema()
          AND tc.table_name = $1
          AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        ORDER BY tc.constraint_type, tc.constraint_name, kcu.ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        error!(table, error = %e, "failed to read key metadata");
        DatabaseError::Sqlx(e)
    })?;

    Ok(assemble_schema(table, columns, keys))
}

fn assemble_schema(table: &str, columns: Vec<ColumnRow>, keys: Vec<KeyRow>) -> TableSchema {
    let mut primary_key = Vec::new();
    let mut unique_keys: Vec<(String, Vec<String>)> = Vec::new();

    for key in keys {
        if key.constraint_type == "PRIMARY KEY" {
            primary_key.push(key.column_name);
            continue;
        }
        match unique_keys.iter_mut().find(|(name, _)| *name == key.constraint_name) {
            Some((_, cols)) => cols.push(key.column_name),
            None => unique_keys.push((key.constraint_name, vec![key.column_name])),
        }
    }

    TableSchema {
        table: table.to_string(),
        columns: columns
            .into_iter()
            .map(|c| ColumnInfo {
                name: c.column_name,
                udt_name: c.udt_name,
                nullable: c.nullable,
                has_default: c.has_default,
            })
            .collect(),
        primary_key,
        unique_keys: unique_keys.into_iter().map(|(_, cols)| cols).collect(),
    }
}
