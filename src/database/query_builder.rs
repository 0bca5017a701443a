use serde_json::Value;
use sqlx::{postgres::PgArguments, FromRow, PgExecutor, Postgres, Row};

use super::ident::quote_identifier;
use super::manager::DatabaseError;
use super::schema::{ColumnInfo, TableSchema, OWNER_COLUMN};
use crate::filter::types::SqlResult;

/// A column and the text value to write into it.
#[derive(Debug, Clone)]
pub struct FieldValue<'s> {
    pub column: &'s ColumnInfo,
    pub value: Option<String>,
}

/// `RETURNING` row of every generated write.
#[derive(Debug, Clone, FromRow)]
pub struct WriteOutcome {
    pub id: Option<Value>,
    pub inserted: bool,
}

pub fn bind_params(sql: &SqlResult) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = q.bind(p.as_deref());
    }
    q
}

pub async fn fetch_json_rows<'c, E>(executor: E, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let rows = bind_params(sql).fetch_all(executor).await?;
    rows.iter()
        .map(|r| r.try_get::<Value, _>("row").map_err(DatabaseError::from))
        .collect()
}

pub async fn fetch_json_optional<'c, E>(executor: E, sql: &SqlResult) -> Result<Option<Value>, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let row = bind_params(sql).fetch_optional(executor).await?;
    row.map(|r| r.try_get::<Value, _>("row"))
        .transpose()
        .map_err(DatabaseError::from)
}

/// Runs a statement built below. `None` means the guarded write touched no row.
pub async fn execute_write<'c, E>(executor: E, sql: &SqlResult) -> Result<Option<WriteOutcome>, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let mut q = sqlx::query_as::<_, WriteOutcome>(&sql.query);
    for p in sql.params.iter() {
        q = q.bind(p.as_deref());
    }
    Ok(q.fetch_optional(executor).await?)
}

pub fn build_insert(schema: &TableSchema, fields: &[FieldValue<'_>]) -> SqlResult {
    let mut params = Vec::with_capacity(fields.len());
    let (columns, values) = insert_lists(fields, &mut params);
    let query = format!(
        "INSERT INTO {} AS t ({}) VALUES ({}) RETURNING {} AS id, true AS inserted",
        schema.quoted_table(),
        columns,
        values,
        returning_id(schema),
    );
    SqlResult { query, params }
}

/// `INSERT .. ON CONFLICT (target) DO UPDATE`, guarded so a conflicting row
/// belonging to another owner is left alone and nothing is returned.
pub fn build_upsert(schema: &TableSchema, fields: &[FieldValue<'_>], target: &[String]) -> SqlResult {
    let mut params = Vec::with_capacity(fields.len());
    let (columns, values) = insert_lists(fields, &mut params);

    let mut assignments: Vec<String> = fields
        .iter()
        .map(|f| f.column.name.as_str())
        .filter(|name| *name != OWNER_COLUMN && !target.iter().any(|t| t == name))
        .map(|name| format!("{0} = EXCLUDED.{0}", quote_identifier(name)))
        .collect();
    if assignments.is_empty() {
        // Nothing to change, but DO UPDATE is still needed to return the existing row.
        if let Some(first) = target.first() {
            assignments.push(format!("{0} = EXCLUDED.{0}", quote_identifier(first)));
        }
    }

    let target_list = target.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ");
    let owner = quote_identifier(OWNER_COLUMN);
    let query = format!(
        "INSERT INTO {} AS t ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {} WHERE t.{} = EXCLUDED.{} RETURNING {} AS id, (t.xmax = 0) AS inserted",
        schema.quoted_table(),
        columns,
        values,
        target_list,
        assignments.join(", "),
        owner,
        owner,
        returning_id(schema),
    );
    SqlResult { query, params }
}

/// `UPDATE .. WHERE key = $ AND user_id = $`; rows of other owners never match.
pub fn build_update(
    schema: &TableSchema,
    fields: &[FieldValue<'_>],
    key: &FieldValue<'_>,
    owner: &FieldValue<'_>,
) -> SqlResult {
    let mut params = Vec::with_capacity(fields.len() + 2);
    let mut assignments = Vec::with_capacity(fields.len());
    for field in fields {
        params.push(field.value.clone());
        assignments.push(format!(
            "{} = {}",
            quote_identifier(&field.column.name),
            field.column.cast_param(params.len())
        ));
    }

    params.push(key.value.clone());
    let key_param = key.column.cast_param(params.len());
    params.push(owner.value.clone());
    let owner_param = owner.column.cast_param(params.len());

    let query = format!(
        "UPDATE {} AS t SET {} WHERE t.{} = {} AND t.{} = {} RETURNING {} AS id, false AS inserted",
        schema.quoted_table(),
        assignments.join(", "),
        quote_identifier(&key.column.name),
        key_param,
        quote_identifier(&owner.column.name),
        owner_param,
        returning_id(schema),
    );
    SqlResult { query, params }
}

/// Removes every row of `table` owned by `user_id`.
pub async fn delete_owned_rows<'c, E>(executor: E, table: &str, user_id: i64) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let query = format!(
        "DELETE FROM {} WHERE {} = $1",
        quote_identifier(table),
        quote_identifier(OWNER_COLUMN)
    );
    let result = sqlx::query(&query).bind(user_id).execute(executor).await?;
    Ok(result.rows_affected())
}

fn insert_lists(fields: &[FieldValue<'_>], params: &mut Vec<Option<String>>) -> (String, String) {
    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        params.push(field.value.clone());
        columns.push(quote_identifier(&field.column.name));
        values.push(field.column.cast_param(params.len()));
    }
    (columns.join(", "), values.join(", "))
}

fn returning_id(schema: &TableSchema) -> String {
    match schema.primary_key.as_slice() {
        [] => "NULL::jsonb".to_string(),
        [only] => format!("to_jsonb(t.{})", quote_identifier(only)),
        many => {
            let pairs: Vec<String> = many
                .iter()
                .map(|c| format!("'{}', t.{}", c, quote_identifier(c)))
                .collect();
            format!("jsonb_build_object({})", pairs.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::tests::protokolle;

    fn field<'s>(schema: &'s TableSchema, name: &str, value: &str) -> FieldValue<'s> {
        FieldValue { column: schema.column(name).unwrap(), value: Some(value.to_string()) }
    }

    #[test]
    fn upsert_guards_ownership_and_skips_target_columns() {
        let schema = protokolle();
        let fields = vec![
            field(&schema, "user_id", "3"),
            field(&schema, "datum", "2024-03-01"),
            field(&schema, "gewicht", "80.5"),
        ];
        let sql = build_upsert(&schema, &fields, &["user_id".into(), "datum".into()]);

        assert_eq!(
            sql.query,
            "INSERT INTO \"protokolle\" AS t (\"user_id\", \"datum\", \"gewicht\") \
             VALUES ($1::\"int8\", $2::\"date\", $3::\"numeric\") \
             ON CONFLICT (\"user_id\", \"datum\") DO UPDATE SET \"gewicht\" = EXCLUDED.\"gewicht\" \
             WHERE t.\"user_id\" = EXCLUDED.\"user_id\" \
             RETURNING to_jsonb(t.\"id\") AS id, (t.xmax = 0) AS inserted"
        );
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn upsert_without_updatable_columns_self_assigns() {
        let schema = protokolle();
        let fields = vec![field(&schema, "user_id", "3"), field(&schema, "datum", "2024-03-01")];
        let sql = build_upsert(&schema, &fields, &["user_id".into(), "datum".into()]);
        assert!(sql.query.contains("DO UPDATE SET \"user_id\" = EXCLUDED.\"user_id\""));
    }

    #[test]
    fn update_binds_key_and_owner_last() {
        let schema = protokolle();
        let fields = vec![field(&schema, "notiz", "hello")];
        let key = field(&schema, "id", "12");
        let owner = field(&schema, "user_id", "3");
        let sql = build_update(&schema, &fields, &key, &owner);

        assert_eq!(
            sql.query,
            "UPDATE \"protokolle\" AS t SET \"notiz\" = $1::\"text\" \
             WHERE t.\"id\" = $2::\"int8\" AND t.\"user_id\" = $3::\"int8\" \
             RETURNING to_jsonb(t.\"id\") AS id, false AS inserted"
        );
        assert_eq!(
            sql.params,
            vec![Some("hello".into()), Some("12".into()), Some("3".into())]
        );
    }

    #[test]
    fn returning_id_shapes() {
        let mut schema = protokolle();
        assert_eq!(returning_id(&schema), "to_jsonb(t.\"id\")");

        schema.primary_key = vec!["user_id".into(), "datum".into()];
        assert_eq!(
            returning_id(&schema),
            "jsonb_build_object('user_id', t.\"user_id\", 'datum', t.\"datum\")"
        );

        schema.primary_key.clear();
        let fields = vec![field(&schema, "user_id", "1")];
        assert!(build_insert(&schema, &fields).query.ends_with("RETURNING NULL::jsonb AS id, true AS inserted"));
    }
}
