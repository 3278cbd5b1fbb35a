use std::collections::HashMap;
use std::sync::Arc;

use crate::access::heap::TableHeap;
use crate::catalog::table::Table;
use crate::error::{Error, Result};
use crate::storage::buffer::pool::BufferPoolManager;

pub mod column;
pub mod table;
pub mod r#type;

/// An entry in the catalog: the table's metadata plus the heap that holds
/// its rows.
pub struct TableInfo {
    pub table: Table,
    pub heap: Arc<TableHeap>,
}

/// In-memory registry of the tables known to the engine. The catalog
/// metadata itself is not persisted; table rows are, through each table's
/// heap.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: HashMap<String, TableInfo>,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Catalog {
        Catalog { bpm, tables: HashMap::new() }
    }

    /// Validate the table definition, allocate its heap and register it.
    pub fn create_table(&mut self, table: Table) -> Result<&TableInfo> {
        table.validate()?;
        if self.tables.contains_key(&table.name) {
            return Err(Error::value(format!("Table {} already exists", table.name)));
        }
        let heap = Arc::new(TableHeap::new(Arc::clone(&self.bpm))?);
        let name = table.name.clone();
        Ok(self.tables.entry(name).or_insert(TableInfo { table, heap }))
    }

    pub fn get_table(&self, name: &str) -> Result<&TableInfo> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::value(format!("Table {} does not exist", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::Column;
    use crate::catalog::r#type::DataType;
    use crate::storage::memory::MemoryDisk;
    use crate::storage::DiskManager;

    #[test]
    fn test_create_and_get_table() -> Result<()> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        let bpm = Arc::new(BufferPoolManager::new(disk, 4));
        let mut catalog = Catalog::new(bpm);

        let table = Table::new("movies", vec![Column::new("id", DataType::Integer)]);
        catalog.create_table(table.clone())?;

        let info = catalog.get_table("movies")?;
        assert_eq!(table, info.table);

        // duplicate creation and unknown lookup both fail
        assert!(catalog.create_table(table).is_err());
        assert!(catalog.get_table("songs").is_err());

        Ok(())
    }
}
