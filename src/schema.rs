use serde::{Deserialize, Serialize};

use crate::row::CellValue;

/// Type of a user-defined column. Addition is the only schema evolution:
/// no rename, no delete, no type change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    Select,
}

impl ColumnType {
    /// The value a row gets for this column when none was supplied.
    pub fn zero_value(self) -> CellValue {
        match self {
            ColumnType::Text | ColumnType::Select => CellValue::Text(String::new()),
            ColumnType::Number => CellValue::Number(0.0),
            ColumnType::Boolean => CellValue::Bool(false),
        }
    }
}

/// One dynamic-field definition. `id` is the stable key into a row's
/// dynamic bag; `label` is display-only and may change independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub default: CellValue,
}

impl Column {
    pub fn new(id: impl Into<String>, label: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ty,
            default: ty.zero_value(),
        }
    }

    pub fn with_default(mut self, default: CellValue) -> Self {
        self.default = default;
        self
    }
}
