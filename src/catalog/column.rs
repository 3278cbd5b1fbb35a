use serde::{Deserialize, Serialize};

use crate::catalog::r#type::DataType;
use crate::error::{Error, Result};

/// A table column schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column data type
    pub datatype: DataType,
    /// Whether the column is nullable
    pub nullable: bool,
}

impl Column {
    pub fn new(name: &str, datatype: DataType) -> Column {
        Column { name: name.to_string(), datatype, nullable: false }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::value("Column name can't be empty"));
        }
        Ok(())
    }
}
