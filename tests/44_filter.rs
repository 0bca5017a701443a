use anyhow::Result;
use serde_json::{json, Map, Value};

use formbase::database::{ColumnInfo, TableSchema};
use formbase::filter::{Filter, FilterError, FilterOrderInfo};
use formbase::services::{plan_save, SaveMode};

fn gewicht_log() -> TableSchema {
    let mut id = ColumnInfo::new("id", "int8");
    id.has_default = true;
    TableSchema {
        table: "gewicht_log".to_string(),
        columns: vec![
            id,
            ColumnInfo::new("user_id", "int8"),
            ColumnInfo::new("datum", "date"),
            ColumnInfo::new("gewicht", "numeric"),
        ],
        primary_key: vec!["id".to_string()],
        unique_keys: vec![vec!["user_id".to_string(), "datum".to_string()]],
    }
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn every_read_ends_with_the_caller_as_owner() -> Result<()> {
    let schema = gewicht_log();
    let mut filter = Filter::new(&schema);
    filter
        .owner(7)
        .where_clause(json!({"user_id": 8, "datum": {"$gte": "2024-04-01"}}))?
        .order(vec![FilterOrderInfo::desc("datum")])
        .max_limit(100)
        .limit(5000)?;

    let sql = filter.to_sql()?;
    assert!(sql.query.contains("\"datum\" >= $1::\"date\" AND \"user_id\" = $2::\"int8\""));
    assert!(sql.query.ends_with("LIMIT 100"));
    assert_eq!(sql.params, vec![Some("2024-04-01".to_string()), Some("7".to_string())]);
    Ok(())
}

#[test]
fn unscoped_reads_do_not_render() {
    let schema = gewicht_log();
    let filter = Filter::new(&schema);
    assert!(matches!(filter.to_sql(), Err(FilterError::MissingOwner)));
}

#[test]
fn unknown_filter_keys_are_rejected() -> Result<()> {
    let schema = gewicht_log();
    let mut filter = Filter::new(&schema);
    filter.owner(7).where_clause(json!({"password_hash": "x"}))?;
    assert!(matches!(filter.to_sql(), Err(FilterError::UnknownField(f)) if f == "password_hash"));
    Ok(())
}

#[test]
fn save_plans_follow_the_available_keys() -> Result<()> {
    let schema = gewicht_log();

    let update = plan_save(&schema, &object(json!({"id": 3, "gewicht": 71.2})), 7)?;
    assert_eq!(update.mode, SaveMode::Update);

    let upsert = plan_save(&schema, &object(json!({"datum": "2024-05-01", "gewicht": 71.2})), 7)?;
    assert_eq!(upsert.mode, SaveMode::Upsert(vec!["user_id".to_string(), "datum".to_string()]));
    assert!(upsert.statement.query.contains("WHERE t.\"user_id\" = EXCLUDED.\"user_id\""));

    let insert = plan_save(&schema, &object(json!({"gewicht": 71.2})), 7)?;
    assert_eq!(insert.mode, SaveMode::Insert);
    Ok(())
}

#[test]
fn caller_supplied_owner_is_overwritten() -> Result<()> {
    let schema = gewicht_log();
    let plan = plan_save(&schema, &object(json!({"user_id": 99, "gewicht": 70})), 7)?;
    assert!(plan.statement.params.contains(&Some("7".to_string())));
    assert!(!plan.statement.params.contains(&Some("99".to_string())));
    Ok(())
}
