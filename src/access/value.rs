use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::catalog::r#type::Value;
use crate::storage::page::PageId;

/// A tuple of values, i.e. one table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tuple(Vec<Value>);

impl Tuple {
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple(values)
    }
}

impl Deref for Tuple {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.0
    }
}

/// Physical address of a tuple: the heap page it lives on and its slot
/// within that page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowId {
    pub page_id: PageId,
    pub slot: u32,
}
