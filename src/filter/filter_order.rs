use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::database::ident::quote_identifier;
use crate::database::schema::TableSchema;

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `"datum desc, id"` into column/direction pairs.
    pub fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[FilterOrderInfo], schema: &TableSchema) -> Result<String, FilterError> {
        if infos.is_empty() { return Ok(String::new()); }
        let mut parts = Vec::with_capacity(infos.len());
        for info in infos {
            if !schema.has_column(&info.column) {
                return Err(FilterError::UnknownField(info.column.clone()));
            }
            parts.push(format!("{} {}", quote_identifier(&info.column), info.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
