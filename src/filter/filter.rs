use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOp, FilterOrderInfo, FilterWhereInfo, SqlResult};
use crate::database::ident::quote_identifier;
use crate::database::schema::{TableSchema, OWNER_COLUMN};

/// Read query over one table. Every query is scoped to an owner: `to_sql`
/// refuses to render without one, and caller conditions on the owner column
/// are ignored in favour of the owner set here.
///
/// Rows come back as a single JSON column named `row`.
pub struct Filter<'s> {
    schema: &'s TableSchema,
    owner: Option<i64>,
    where_data: Option<Value>,
    conditions: Vec<FilterWhereInfo>,
    select_columns: Vec<String>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    max_limit: Option<i64>,
}

impl<'s> Filter<'s> {
    pub fn new(schema: &'s TableSchema) -> Self {
        Self {
            schema,
            owner: None,
            where_data: None,
            conditions: vec![],
            select_columns: vec![],
            order_data: vec![],
            limit: None,
            max_limit: None,
        }
    }

    pub fn owner(&mut self, user_id: i64) -> &mut Self {
        self.owner = Some(user_id);
        self
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    /// Adds a server-side condition (date windows and the like).
    pub fn condition(&mut self, column: impl Into<String>, operator: FilterOp, data: Value) -> &mut Self {
        self.conditions.push(FilterWhereInfo { column: column.into(), operator, data });
        self
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if !self.schema.has_column(column) {
                return Err(FilterError::UnknownField(column.clone()));
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> &mut Self {
        self.order_data = order;
        self
    }

    pub fn max_limit(&mut self, max: i64) -> &mut Self {
        self.max_limit = Some(max);
        self
    }

    pub fn limit(&mut self, limit: i64) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        let applied_limit = match self.max_limit {
            Some(max) if limit > max => {
                tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max);
                max
            }
            _ => limit,
        };
        self.limit = Some(applied_limit);
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let owner = self.owner.ok_or(FilterError::MissingOwner)?;
        if self.schema.owner_column().is_none() {
            return Err(FilterError::MissingOwnerColumn(self.schema.table.clone()));
        }

        let mut filter_where = FilterWhere::new(self.schema, 0);
        if let Some(ref where_data) = self.where_data {
            filter_where.parse(where_data)?;
        }
        for condition in &self.conditions {
            filter_where.push(condition.clone())?;
        }
        filter_where.push(FilterWhereInfo {
            column: OWNER_COLUMN.to_string(),
            operator: FilterOp::Eq,
            data: Value::from(owner),
        })?;
        let (where_clause, params) = filter_where.generate()?;

        let order_clause = FilterOrder::generate(&self.order_data, self.schema)?;
        let limit_clause = self.limit.map(|l| format!("LIMIT {}", l)).unwrap_or_default();

        let query = [
            format!("SELECT {} AS row", self.build_select_clause()),
            format!("FROM {} AS t", self.schema.quoted_table()),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult { query, params })
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() {
            return "row_to_json(t)".to_string();
        }
        let pairs: Vec<String> = self
            .select_columns
            .iter()
            .map(|c| format!("'{}', t.{}", c, quote_identifier(c)))
            .collect();
        format!("json_build_object({})", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::tests::protokolle;
    use serde_json::json;

    #[test]
    fn owner_is_always_appended() {
        let schema = protokolle();
        let mut filter = Filter::new(&schema);
        filter.owner(42).where_clause(json!({"datum": "2024-03-01", "user_id": 7})).unwrap();

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT row_to_json(t) AS row FROM \"protokolle\" AS t WHERE \"datum\" = $1::\"date\" AND \"user_id\" = $2::\"int8\""
        );
        assert_eq!(sql.params, vec![Some("2024-03-01".to_string()), Some("42".to_string())]);
    }

    #[test]
    fn refuses_unscoped_queries() {
        let schema = protokolle();
        assert!(matches!(Filter::new(&schema).to_sql(), Err(FilterError::MissingOwner)));

        let mut no_owner_col = protokolle();
        no_owner_col.columns.retain(|c| c.name != "user_id");
        let mut filter = Filter::new(&no_owner_col);
        filter.owner(1);
        assert!(matches!(filter.to_sql(), Err(FilterError::MissingOwnerColumn(_))));
    }

    #[test]
    fn projection_order_and_capped_limit() {
        let schema = protokolle();
        let mut filter = Filter::new(&schema);
        filter
            .owner(1)
            .condition("datum", FilterOp::Lte, json!("2024-03-01"))
            .order(vec![FilterOrderInfo::desc("datum")])
            .max_limit(50)
            .select(vec!["datum".into(), "gewicht".into()])
            .unwrap()
            .limit(500)
            .unwrap();

        let sql = filter.to_sql().unwrap();
        assert!(sql.query.starts_with("SELECT json_build_object('datum', t.\"datum\", 'gewicht', t.\"gewicht\") AS row"));
        assert!(sql.query.ends_with("ORDER BY \"datum\" DESC LIMIT 50"));
        assert!(sql.query.contains("\"datum\" <= $1::\"date\" AND \"user_id\" = $2::\"int8\""));
    }

    #[test]
    fn rejects_unknown_projection_and_negative_limit() {
        let schema = protokolle();
        let mut filter = Filter::new(&schema);
        assert!(filter.select(vec!["password_hash".into()]).is_err());
        assert!(filter.limit(-1).is_err());
    }
}
