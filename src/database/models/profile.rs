//! Profile rows live in a configurable table keyed by `user_id`; the only
//! attribute the server itself reads is `is_pro`.

use serde_json::Value;
use sqlx::{PgExecutor, Row};

use crate::database::ident::quote_identifier;
use crate::database::manager::DatabaseError;

pub async fn create_empty<'c, E: PgExecutor<'c>>(db: E, table: &str, user_id: i64) -> Result<(), DatabaseError> {
    let query = format!("INSERT INTO {} (user_id) VALUES ($1)", quote_identifier(table));
    sqlx::query(&query).bind(user_id).execute(db).await?;
    Ok(())
}

pub async fn find<'c, E: PgExecutor<'c>>(db: E, table: &str, user_id: i64) -> Result<Option<Value>, DatabaseError> {
    let query = format!(
        "SELECT row_to_json(p) AS row FROM {} AS p WHERE p.user_id = $1",
        quote_identifier(table)
    );
    let row = sqlx::query(&query).bind(user_id).fetch_optional(db).await?;
    Ok(row.map(|r| r.try_get::<Value, _>("row")).transpose()?)
}

pub async fn is_pro<'c, E: PgExecutor<'c>>(db: E, table: &str, user_id: i64) -> Result<bool, DatabaseError> {
    Ok(find(db, table, user_id).await?.as_ref().map(is_pro_from).unwrap_or(false))
}

/// Accepts the shapes `is_pro` takes across schemas: boolean, 0/1, or their text forms.
pub fn is_pro_from(profile: &Value) -> bool {
    match profile.get("is_pro") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "t" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_is_pro_in_any_shape() {
        assert!(is_pro_from(&json!({"is_pro": true})));
        assert!(is_pro_from(&json!({"is_pro": 1})));
        assert!(is_pro_from(&json!({"is_pro": "t"})));
        assert!(!is_pro_from(&json!({"is_pro": 0})));
        assert!(!is_pro_from(&json!({"is_pro": null})));
        assert!(!is_pro_from(&json!({})));
    }
}
