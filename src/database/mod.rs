pub mod ident;
pub mod manager;
pub mod mapping;
pub mod models;
pub mod query_builder;
pub mod schema;

pub use manager::{Database, DatabaseError, SetupFailure, SetupReport};
pub use mapping::{MappingNotFound, MappingResolver, MappingSpec};
pub use schema::{ColumnInfo, SchemaCache, TableSchema, OWNER_COLUMN};
