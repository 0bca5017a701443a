use std::collections::HashMap;
use thiserror::Error;

use super::ident::is_valid_identifier;
use crate::config::{AppFile, ConfigError, MappingEntry};
use crate::filter::{FilterOrder, FilterOrderInfo};

#[derive(Debug, Error)]
#[error("Mapping not found: {0}")]
pub struct MappingNotFound(pub String);

/// A resolved form mapping: the logical name clients use and the table behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingSpec {
    pub name: String,
    pub table: String,
    pub date_column: Option<String>,
    pub order: Vec<FilterOrderInfo>,
    pub history_columns: Option<Vec<String>>,
}

impl MappingSpec {
    /// Explicit order, else newest first by the date column.
    pub fn default_order(&self) -> Vec<FilterOrderInfo> {
        if !self.order.is_empty() {
            return self.order.clone();
        }
        self.date_column
            .iter()
            .map(|c| FilterOrderInfo::desc(c.as_str()))
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MappingResolver {
    mappings: HashMap<String, MappingSpec>,
}

impl MappingResolver {
    pub fn from_app_file(file: &AppFile) -> Result<Self, ConfigError> {
        let mut mappings = HashMap::with_capacity(file.form_mappings.len());
        for (name, entry) in &file.form_mappings {
            let spec = match entry {
                MappingEntry::Table(table) => MappingSpec {
                    name: name.clone(),
                    table: table.clone(),
                    date_column: None,
                    order: vec![],
                    history_columns: None,
                },
                MappingEntry::Detailed(detail) => {
                    let order = detail
                        .order
                        .as_deref()
                        .map(FilterOrder::parse_order_string)
                        .unwrap_or_default();
                    for info in &order {
                        if !is_valid_identifier(&info.column) {
                            return Err(ConfigError::InvalidIdentifier {
                                context: format!("form_mappings.{}.order", name),
                                name: info.column.clone(),
                            });
                        }
                    }
                    MappingSpec {
                        name: name.clone(),
                        table: detail.table.clone(),
                        date_column: detail.date_column.clone(),
                        order,
                        history_columns: detail.history_columns.clone(),
                    }
                }
            };
            mappings.insert(name.clone(), spec);
        }
        Ok(Self { mappings })
    }

    pub fn resolve(&self, name: &str) -> Result<&MappingSpec, MappingNotFound> {
        self.mappings
            .get(name)
            .ok_or_else(|| MappingNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
