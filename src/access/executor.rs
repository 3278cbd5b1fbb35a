use std::sync::Arc;

use crate::access::heap::{TableHeap, TableIter};
use crate::access::value::Tuple;
use crate::error::{Error, Result};

/// A row predicate applied during a scan.
pub type Predicate = Box<dyn Fn(&Tuple) -> bool>;

/// Volcano-style executor: init once, then pull one tuple per next call
/// until None.
pub trait Executor {
    fn init(&mut self) -> Result<()>;
    fn next(&mut self) -> Result<Option<Tuple>>;
}

/// Sequential scan over a table heap with an optional predicate.
pub struct SeqScanExecutor {
    heap: Arc<TableHeap>,
    predicate: Option<Predicate>,
    iter: Option<TableIter>,
}

impl SeqScanExecutor {
    pub fn new(heap: Arc<TableHeap>, predicate: Option<Predicate>) -> SeqScanExecutor {
        SeqScanExecutor { heap, predicate, iter: None }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(self.heap.scan());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let iter = match self.iter.as_mut() {
            Some(iter) => iter,
            None => return Err(Error::internal("scan executor used before init")),
        };
        for item in iter {
            let (_, tuple) = item?;
            let accept = match &self.predicate {
                Some(predicate) => predicate(&tuple),
                None => true,
            };
            if accept {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

/// Where an insert executor takes its rows from: a raw list of tuples, or
/// a child executor it drains.
pub enum InsertSource {
    Raw(Vec<Tuple>),
    Child(Box<dyn Executor>),
}

/// Inserts rows into a table heap, one per next call, yielding each
/// inserted tuple.
pub struct InsertExecutor {
    heap: Arc<TableHeap>,
    source: InsertSource,
    cursor: usize,
}

impl InsertExecutor {
    pub fn new(heap: Arc<TableHeap>, source: InsertSource) -> InsertExecutor {
        InsertExecutor { heap, source, cursor: 0 }
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        if let InsertSource::Child(child) = &mut self.source {
            child.init()?;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let tuple = match &mut self.source {
            InsertSource::Raw(rows) => {
                if self.cursor >= rows.len() {
                    return Ok(None);
                }
                let tuple = rows[self.cursor].clone();
                self.cursor += 1;
                tuple
            }
            InsertSource::Child(child) => match child.next()? {
                Some(tuple) => tuple,
                None => return Ok(None),
            },
        };
        self.heap.insert_tuple(&tuple)?;
        Ok(Some(tuple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::Column;
    use crate::catalog::r#type::{DataType, Value};
    use crate::catalog::{Catalog, TableInfo};
    use crate::storage::buffer::pool::BufferPoolManager;
    use crate::storage::memory::MemoryDisk;
    use crate::storage::DiskManager;

    fn row(id: i64, title: &str) -> Tuple {
        Tuple::from(vec![Value::Integer(id), Value::String(title.to_string())])
    }

    fn drain(executor: &mut dyn Executor) -> Result<Vec<Tuple>> {
        executor.init()?;
        let mut tuples = Vec::new();
        while let Some(tuple) = executor.next()? {
            tuples.push(tuple);
        }
        Ok(tuples)
    }

    fn setup_movies(catalog: &mut Catalog) -> Result<Arc<TableHeap>> {
        use crate::catalog::table::Table;
        let table = Table::new(
            "movies",
            vec![Column::new("id", DataType::Integer), Column::new("title", DataType::String)],
        );
        let TableInfo { heap, .. } = catalog.create_table(table)?;
        Ok(Arc::clone(heap))
    }

    #[test]
    fn test_insert_then_scan() -> Result<()> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        let bpm = Arc::new(BufferPoolManager::new(disk, 4));
        let mut catalog = Catalog::new(Arc::clone(&bpm));
        let heap = setup_movies(&mut catalog)?;

        // Scenario: a raw insert yields each inserted row once.
        let rows = vec![row(1, "up"), row(2, "heat"), row(3, "alien")];
        let mut insert =
            InsertExecutor::new(Arc::clone(&heap), InsertSource::Raw(rows.clone()));
        assert_eq!(rows, drain(&mut insert)?);

        // Scenario: a full scan returns every row, a predicated scan only
        // the matching ones.
        let mut scan = SeqScanExecutor::new(Arc::clone(&heap), None);
        assert_eq!(rows, drain(&mut scan)?);

        let predicate: Predicate = Box::new(|tuple| tuple[0] == Value::Integer(2));
        let mut scan = SeqScanExecutor::new(Arc::clone(&heap), Some(predicate));
        assert_eq!(vec![row(2, "heat")], drain(&mut scan)?);

        Ok(())
    }

    #[test]
    fn test_insert_from_child() -> Result<()> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        let bpm = Arc::new(BufferPoolManager::new(disk, 8));
        let mut catalog = Catalog::new(Arc::clone(&bpm));
        let source = setup_movies(&mut catalog)?;

        let rows = vec![row(1, "up"), row(2, "heat")];
        let mut insert =
            InsertExecutor::new(Arc::clone(&source), InsertSource::Raw(rows.clone()));
        drain(&mut insert)?;

        // Scenario: an insert executor driven by a scan of another table
        // copies its rows.
        use crate::catalog::table::Table;
        let target = Table::new("copies", vec![Column::new("id", DataType::Integer)]);
        let TableInfo { heap: target_heap, .. } = catalog.create_table(target)?;
        let target_heap = Arc::clone(target_heap);

        let scan = SeqScanExecutor::new(Arc::clone(&source), None);
        let mut insert =
            InsertExecutor::new(Arc::clone(&target_heap), InsertSource::Child(Box::new(scan)));
        assert_eq!(rows, drain(&mut insert)?);

        let mut scan = SeqScanExecutor::new(target_heap, None);
        assert_eq!(rows, drain(&mut scan)?);

        Ok(())
    }

    #[test]
    fn test_scan_before_init_fails() -> Result<()> {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDisk::new());
        let bpm = Arc::new(BufferPoolManager::new(disk, 4));
        let mut catalog = Catalog::new(Arc::clone(&bpm));
        let heap = setup_movies(&mut catalog)?;

        let mut scan = SeqScanExecutor::new(heap, None);
        assert!(scan.next().is_err());

        Ok(())
    }
}
