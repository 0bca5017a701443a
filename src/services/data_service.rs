use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::ClockExt;
use crate::config::{AppConfig, AppFile};
use crate::database::models::profile;
use crate::database::query_builder::{self, FieldValue};
use crate::database::{DatabaseError, MappingNotFound, MappingSpec, TableSchema, OWNER_COLUMN};
use crate::filter::{param_text, Filter, FilterError, FilterOp, FilterOrderInfo, SqlResult};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    MappingNotFound(#[from] MappingNotFound),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("No valid fields to save")]
    NoValidFields,

    #[error("Record not found")]
    RecordNotFound,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Mapping {0} has no date column")]
    NoDateColumn(String),

    #[error("Export is not configured")]
    ExportNotConfigured,

    #[error("Query failed: {0}")]
    QueryFailed(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOperation {
    Insert,
    Update,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub id: Value,
    pub operation: SaveOperation,
    pub affected_rows: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveMode {
    /// Payload carried the primary key: update that row if the caller owns it.
    Update,
    /// Insert, or update the row that collides on this key.
    Upsert(Vec<String>),
    Insert,
}

#[derive(Debug, Clone)]
pub struct SavePlan {
    pub mode: SaveMode,
    pub statement: SqlResult,
}

/// Turns a save payload into one guarded statement.
///
/// The owner column is always the caller's id, empty strings become NULL and
/// keys that are not columns of the table are dropped.
pub fn plan_save(schema: &TableSchema, data: &Map<String, Value>, user_id: i64) -> Result<SavePlan, DataError> {
    let owner_column = schema
        .owner_column()
        .ok_or_else(|| FilterError::MissingOwnerColumn(schema.table.clone()))?;
    let owner = FieldValue { column: owner_column, value: Some(user_id.to_string()) };

    let mut fields: Vec<FieldValue<'_>> = Vec::new();
    for column in &schema.columns {
        if column.name == OWNER_COLUMN {
            fields.push(owner.clone());
            continue;
        }
        if let Some(value) = data.get(&column.name) {
            let value = match value {
                Value::String(s) if s.is_empty() => None,
                other => param_text(other),
            };
            fields.push(FieldValue { column, value });
        }
    }

    if !fields.iter().any(|f| f.column.name != OWNER_COLUMN) {
        return Err(DataError::NoValidFields);
    }

    let explicit_key = schema
        .single_primary_key()
        .filter(|pk| pk.name != OWNER_COLUMN)
        .and_then(|pk| fields.iter().position(|f| f.column.name == pk.name && f.value.is_some()));

    if let Some(pos) = explicit_key {
        let key = fields.remove(pos);
        fields.retain(|f| f.column.name != OWNER_COLUMN);
        if fields.is_empty() {
            return Err(DataError::NoValidFields);
        }
        let statement = query_builder::build_update(schema, &fields, &key, &owner);
        return Ok(SavePlan { mode: SaveMode::Update, statement });
    }

    // NULL into a defaulted column would override the default (serial keys included).
    fields.retain(|f| f.value.is_some() || !f.column.has_default);
    if !fields.iter().any(|f| f.column.name != OWNER_COLUMN) {
        return Err(DataError::NoValidFields);
    }

    let target = schema.conflict_targets().find(|key| {
        key.iter().all(|col| fields.iter().any(|f| f.column.name == *col && f.value.is_some()))
    });

    Ok(match target {
        Some(target) => SavePlan {
            mode: SaveMode::Upsert(target.to_vec()),
            statement: query_builder::build_upsert(schema, &fields, target),
        },
        None => SavePlan {
            mode: SaveMode::Insert,
            statement: query_builder::build_insert(schema, &fields),
        },
    })
}

/// Generic CRUD over mapped tables, always scoped to one user.
pub struct DataService<'a> {
    state: &'a AppState,
}

impl<'a> DataService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    async fn resolve(&self, mapping: &str) -> Result<(&'a MappingSpec, Arc<TableSchema>), DataError> {
        let spec = self.state.mappings.resolve(mapping)?;
        let schema = self.state.schemas.get(self.state.db.pool(), &spec.table).await?;
        Ok((spec, schema))
    }

    fn base_filter<'s>(&self, schema: &'s TableSchema, user_id: i64) -> Filter<'s> {
        let mut filter = Filter::new(schema);
        filter.owner(user_id).max_limit(self.state.config.filter.max_limit);
        filter
    }

    fn log_query(&self, sql: &SqlResult) {
        if logs_queries(&self.state.config, &self.state.app) {
            debug!(query = %sql.query, params = sql.params.len(), "generated query");
        }
    }

    /// First matching row, or `{}` when nothing matches.
    pub async fn load_one(&self, user_id: i64, mapping: &str, conditions: Value) -> Result<Value, DataError> {
        let (spec, schema) = self.resolve(mapping).await?;
        let mut filter = self.base_filter(&schema, user_id);
        filter.where_clause(conditions)?.order(spec.default_order()).limit(1)?;

        let sql = filter.to_sql()?;
        self.log_query(&sql);
        let row = query_builder::fetch_json_optional(self.state.db.pool(), &sql)
            .await
            .map_err(|e| self.query_failed(mapping, e))?;
        Ok(row.unwrap_or_else(|| json!({})))
    }

    /// Every matching row, capped at the configured maximum.
    pub async fn load_many(&self, user_id: i64, mapping: &str, conditions: Value) -> Result<Vec<Value>, DataError> {
        let (spec, schema) = self.resolve(mapping).await?;
        let mut filter = self.base_filter(&schema, user_id);
        filter
            .where_clause(conditions)?
            .order(spec.default_order())
            .limit(self.state.config.filter.max_limit)?;

        self.fetch(mapping, &filter).await
    }

    /// Rows of the last `days` days, newest first. `days: 0` drops the window
    /// but keeps date ordering; without `days`, rows come newest by key.
    pub async fn table_data(&self, user_id: i64, mapping: &str, days: Option<i64>) -> Result<Vec<Value>, DataError> {
        let (spec, schema) = self.resolve(mapping).await?;
        let mut filter = self.base_filter(&schema, user_id);

        match days {
            Some(days) if days < 0 => {
                return Err(DataError::InvalidPayload("days must be non-negative".to_string()));
            }
            Some(0) => {
                let order = match spec.date_column.as_deref() {
                    Some(date_column) => vec![FilterOrderInfo::desc(date_column)],
                    None => newest_by_key(spec, &schema),
                };
                filter.order(order);
            }
            Some(days) => {
                let date_column = spec
                    .date_column
                    .as_deref()
                    .ok_or_else(|| DataError::NoDateColumn(spec.name.clone()))?;
                let since = self.state.clock.today() - Duration::days(days);
                filter
                    .condition(date_column, FilterOp::Gte, json!(since.to_string()))
                    .order(vec![FilterOrderInfo::desc(date_column)]);
            }
            None => {
                filter.order(newest_by_key(spec, &schema));
            }
        }
        filter.limit(self.state.config.filter.max_limit)?;

        self.fetch(mapping, &filter).await
    }

    /// Up to `limit` rows dated on or before `end_date` (default today), newest first.
    pub async fn history(
        &self,
        user_id: i64,
        mapping: &str,
        end_date: Option<NaiveDate>,
        limit: Option<i64>,
    ) -> Result<Vec<Value>, DataError> {
        let (spec, schema) = self.resolve(mapping).await?;
        let date_column = spec
            .date_column
            .as_deref()
            .ok_or_else(|| DataError::NoDateColumn(spec.name.clone()))?;
        let end_date = end_date.unwrap_or_else(|| self.state.clock.today());
        let limit = limit.unwrap_or(self.state.config.filter.default_history_limit);

        let mut filter = self.base_filter(&schema, user_id);
        filter
            .condition(date_column, FilterOp::Lte, json!(end_date.to_string()))
            .order(vec![FilterOrderInfo::desc(date_column)])
            .limit(limit)?;
        if let Some(columns) = &spec.history_columns {
            filter.select(columns.clone())?;
        }

        self.fetch(mapping, &filter).await
    }

    /// Profile row plus the configured history window, oldest first.
    pub async fn export(&self, user_id: i64) -> Result<Value, DataError> {
        let export = self.state.app.export.as_ref().ok_or(DataError::ExportNotConfigured)?;
        let (spec, schema) = self.resolve(&export.history_mapping).await?;
        let date_column = spec
            .date_column
            .as_deref()
            .ok_or_else(|| DataError::NoDateColumn(spec.name.clone()))?;

        let profile = profile::find(self.state.db.pool(), &self.state.app.account.profile_table, user_id)
            .await
            .map_err(|e| self.query_failed("export", e))?
            .unwrap_or_else(|| json!({}));

        let since = self.state.clock.today() - Duration::days(export.days);
        let mut filter = Filter::new(&schema);
        filter
            .owner(user_id)
            .condition(date_column, FilterOp::Gte, json!(since.to_string()))
            .order(vec![FilterOrderInfo::asc(date_column)]);
        let history = self.fetch(&spec.name, &filter).await?;

        Ok(json!({
            "user_profile": profile,
            "protokoll_history": history,
        }))
    }

    pub async fn save(&self, user_id: i64, mapping: &str, data: &Value) -> Result<SaveOutcome, DataError> {
        let data = data
            .as_object()
            .ok_or_else(|| DataError::InvalidPayload("data must be an object".to_string()))?;
        let (_, schema) = self.resolve(mapping).await?;

        let plan = plan_save(&schema, data, user_id)?;
        self.log_query(&plan.statement);

        let outcome = query_builder::execute_write(self.state.db.pool(), &plan.statement)
            .await
            .map_err(|e| self.query_failed(mapping, e))?
            .ok_or(DataError::RecordNotFound)?;

        let operation = match plan.mode {
            SaveMode::Update => SaveOperation::Update,
            _ if outcome.inserted => SaveOperation::Insert,
            _ => SaveOperation::Update,
        };
        debug!(mapping, user_id, ?operation, "saved record");

        Ok(SaveOutcome {
            id: outcome.id.unwrap_or(Value::Null),
            operation,
            affected_rows: 1,
        })
    }

    async fn fetch(&self, mapping: &str, filter: &Filter<'_>) -> Result<Vec<Value>, DataError> {
        let sql = filter.to_sql()?;
        self.log_query(&sql);
        query_builder::fetch_json_rows(self.state.db.pool(), &sql)
            .await
            .map_err(|e| self.query_failed(mapping, e))
    }

    fn query_failed(&self, mapping: &str, err: DatabaseError) -> DataError {
        error!(mapping, error = %err, "data query failed");
        DataError::QueryFailed(err)
    }
}

/// Generated SQL is logged when the environment or the application file asks for it.
fn logs_queries(config: &AppConfig, app: &AppFile) -> bool {
    config.filter.debug_logging || app.debug_mode
}

fn newest_by_key(spec: &MappingSpec, schema: &TableSchema) -> Vec<FilterOrderInfo> {
    match schema.primary_key.as_slice() {
        [] => spec.default_order(),
        keys => keys.iter().map(|k| FilterOrderInfo::desc(k.as_str())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::tests::protokolle;
    use crate::database::ColumnInfo;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn app_file_debug_mode_enables_query_logging() {
        let config = AppConfig::production();
        let mut app = AppFile::default();
        assert!(!logs_queries(&config, &app));

        app.debug_mode = true;
        assert!(logs_queries(&config, &app));
        assert!(logs_queries(&AppConfig::development(), &AppFile::default()));
    }

    #[test]
    fn primary_key_selects_guarded_update() {
        let schema = protokolle();
        let plan = plan_save(&schema, &payload(json!({"id": 12, "notiz": "x", "user_id": 99})), 3).unwrap();

        assert_eq!(plan.mode, SaveMode::Update);
        assert!(plan.statement.query.starts_with("UPDATE \"protokolle\" AS t SET \"notiz\" = $1::\"text\" WHERE"));
        assert_eq!(
            plan.statement.params,
            vec![Some("x".into()), Some("12".into()), Some("3".into())]
        );
    }

    #[test]
    fn unique_key_selects_upsert_with_forced_owner() {
        let schema = protokolle();
        let plan = plan_save(
            &schema,
            &payload(json!({"datum": "2024-03-01", "gewicht": 80.1, "user_id": 99, "bogus": 1})),
            3,
        )
        .unwrap();

        assert_eq!(plan.mode, SaveMode::Upsert(vec!["user_id".into(), "datum".into()]));
        assert!(!plan.statement.query.contains("bogus"));
        assert_eq!(
            plan.statement.params,
            vec![Some("3".into()), Some("2024-03-01".into()), Some("80.1".into())]
        );
    }

    #[test]
    fn empty_strings_become_null_and_disable_keys() {
        let schema = protokolle();
        let plan = plan_save(&schema, &payload(json!({"id": "", "datum": "", "notiz": "hi"})), 3).unwrap();

        assert_eq!(plan.mode, SaveMode::Insert);
        assert!(plan.statement.query.starts_with("INSERT INTO \"protokolle\" AS t (\"user_id\", \"datum\", \"notiz\")"));
        assert_eq!(
            plan.statement.params,
            vec![Some("3".into()), None, Some("hi".into())]
        );
    }

    #[test]
    fn nothing_but_owner_is_rejected() {
        let schema = protokolle();
        assert!(matches!(
            plan_save(&schema, &payload(json!({"user_id": 5, "password": "x"})), 3),
            Err(DataError::NoValidFields)
        ));
        assert!(matches!(
            plan_save(&schema, &payload(json!({"id": 7})), 3),
            Err(DataError::NoValidFields)
        ));
        assert!(matches!(
            plan_save(&schema, &payload(json!({"id": ""})), 3),
            Err(DataError::NoValidFields)
        ));
    }

    #[test]
    fn owner_keyed_profile_upserts_on_owner() {
        let schema = TableSchema {
            table: "user_profiles".to_string(),
            columns: vec![ColumnInfo::new("user_id", "int8"), ColumnInfo::new("is_pro", "bool")],
            primary_key: vec!["user_id".to_string()],
            unique_keys: vec![],
        };
        let plan = plan_save(&schema, &payload(json!({"is_pro": true})), 3).unwrap();
        assert_eq!(plan.mode, SaveMode::Upsert(vec!["user_id".into()]));
        assert!(plan.statement.query.contains("DO UPDATE SET \"is_pro\" = EXCLUDED.\"is_pro\""));
    }

    #[test]
    fn tables_without_owner_column_are_refused() {
        let mut schema = protokolle();
        schema.columns.retain(|c| c.name != "user_id");
        assert!(matches!(
            plan_save(&schema, &payload(json!({"notiz": "x"})), 3),
            Err(DataError::Filter(FilterError::MissingOwnerColumn(_)))
        ));
    }
}
