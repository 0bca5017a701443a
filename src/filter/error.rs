use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Table {0} has no owner column")]
    MissingOwnerColumn(String),

    #[error("Query is not scoped to an owner")]
    MissingOwner,
}
