use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::column::Column;
use crate::error::{Error, Result};

/// Table holds metadata about a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Table columns
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<Column>) -> Table {
        Table { name: name.to_string(), columns }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::value("Table name can't be empty"));
        }
        if self.columns.is_empty() {
            return Err(Error::value(format!("Table {} has no columns", self.name)));
        }
        let mut names = HashSet::new();
        for column in &self.columns {
            column.validate()?;
            if !names.insert(&column.name) {
                return Err(Error::value(format!(
                    "Duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::r#type::DataType;

    #[test]
    fn test_validate() -> Result<()> {
        let table = Table::new(
            "movies",
            vec![Column::new("id", DataType::Integer), Column::new("title", DataType::String)],
        );
        table.validate()?;

        let unnamed = Table::new("", vec![Column::new("id", DataType::Integer)]);
        assert!(unnamed.validate().is_err());

        let empty = Table::new("movies", vec![]);
        assert!(empty.validate().is_err());

        let duplicated = Table::new(
            "movies",
            vec![Column::new("id", DataType::Integer), Column::new("id", DataType::Integer)],
        );
        assert!(duplicated.validate().is_err());

        Ok(())
    }
}
