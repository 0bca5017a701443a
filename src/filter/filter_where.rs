use serde_json::Value;

use super::error::FilterError;
use super::types::{param_text, FilterOp, FilterWhereInfo};
use crate::database::ident::quote_identifier;
use crate::database::schema::{ColumnInfo, TableSchema, OWNER_COLUMN};

/// Builds a WHERE clause from a JSON condition map, checked against a table schema.
pub struct FilterWhere<'s> {
    schema: &'s TableSchema,
    param_values: Vec<Option<String>>,
    param_index: usize,
    conditions: Vec<FilterWhereInfo>,
}

impl<'s> FilterWhere<'s> {
    pub fn new(schema: &'s TableSchema, starting_param_index: usize) -> Self {
        Self {
            schema,
            param_values: vec![],
            param_index: starting_param_index,
            conditions: vec![],
        }
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Adds the conditions of a caller-supplied map. The owner column is not
    /// caller-controlled and is silently dropped.
    pub fn parse(&mut self, where_data: &Value) -> Result<(), FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };

        for (key, value) in obj {
            if key.starts_with('$') {
                return Err(FilterError::UnsupportedOperator(key.clone()));
            }
            if key == OWNER_COLUMN {
                continue;
            }
            self.parse_field_condition(key, value)?;
        }
        Ok(())
    }

    pub fn push(&mut self, condition: FilterWhereInfo) -> Result<(), FilterError> {
        self.column(&condition.column)?;
        self.conditions.push(condition);
        Ok(())
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<(), FilterError> {
        match value {
            Value::Object(ops) => {
                for (op_key, op_val) in ops {
                    let operator = FilterOp::from_key(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    self.push(FilterWhereInfo { column: field.to_string(), operator, data: op_val.clone() })?;
                }
                Ok(())
            }
            Value::Array(_) => self.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::In, data: value.clone() }),
            // Implicit equality: { field: value }
            _ => self.push(FilterWhereInfo { column: field.to_string(), operator: FilterOp::Eq, data: value.clone() }),
        }
    }

    fn column(&self, name: &str) -> Result<&'s ColumnInfo, FilterError> {
        self.schema
            .column(name)
            .ok_or_else(|| FilterError::UnknownField(name.to_string()))
    }

    pub fn generate(mut self) -> Result<(String, Vec<Option<String>>), FilterError> {
        let conditions = std::mem::take(&mut self.conditions);
        let mut sql_conditions = Vec::with_capacity(conditions.len());
        for condition in &conditions {
            sql_conditions.push(self.build_sql_condition(condition)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, self.param_values))
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = self.column(&condition.column)?;
        let quoted_column = quote_identifier(&column.name);

        match condition.operator {
            FilterOp::Eq if condition.data.is_null() => Ok(format!("{} IS NULL", quoted_column)),
            FilterOp::Ne if condition.data.is_null() => Ok(format!("{} IS NOT NULL", quoted_column)),
            FilterOp::Like => match &condition.data {
                Value::String(_) => Ok(format!("{}::text LIKE {}", quoted_column, self.param(None, &condition.data))),
                _ => Err(FilterError::InvalidOperatorData("$like requires a string pattern".to_string())),
            },
            FilterOp::In => match &condition.data {
                Value::Array(values) => {
                    if values.is_empty() { return Ok("1=0".to_string()); }
                    let params: Vec<String> = values.iter().map(|v| self.param(Some(column), v)).collect();
                    Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
                }
                Value::Null => Ok(format!("{} IS NULL", quoted_column)),
                other => Ok(format!("{} = {}", quoted_column, self.param(Some(column), other))),
            },
            op => {
                if condition.data.is_null() {
                    return Err(FilterError::InvalidOperatorData(format!("{:?} cannot compare against null", op)));
                }
                let comparison = op
                    .comparison()
                    .ok_or_else(|| FilterError::UnsupportedOperator(format!("{:?}", op)))?;
                Ok(format!("{} {} {}", quoted_column, comparison, self.param(Some(column), &condition.data)))
            }
        }
    }

    fn param(&mut self, cast_to: Option<&ColumnInfo>, value: &Value) -> String {
        self.param_values.push(param_text(value));
        self.param_index += 1;
        match cast_to {
            Some(column) => column.cast_param(self.param_index),
            None => format!("${}", self.param_index),
        }
    }
}
