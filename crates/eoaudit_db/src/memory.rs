//! In-memory dataset registry for tests and offline runs.

use crate::{DatacubeIndex, DatasetType, DbError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    types: Vec<DatasetType>,
    counts: HashMap<i32, i64>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset type with its row count.
    pub fn with_type(mut self, id: i32, name: impl Into<String>, rows: i64) -> Self {
        self.types.push(DatasetType {
            id,
            name: name.into(),
        });
        self.counts.insert(id, rows);
        self
    }
}

#[async_trait]
impl DatacubeIndex for MemoryIndex {
    async fn list_registered_types(&self) -> Result<Vec<DatasetType>> {
        let mut types = self.types.clone();
        types.sort_by_key(|t| t.id);
        Ok(types)
    }

    async fn count_rows(&self, type_id: i32) -> Result<i64> {
        self.counts
            .get(&type_id)
            .copied()
            .ok_or_else(|| DbError::not_found(format!("dataset type {}", type_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_index() {
        let index = MemoryIndex::new()
            .with_type(2, "s2_l2a", 40)
            .with_type(1, "landsat8", 12);

        let types = index.list_registered_types().await.unwrap();
        assert_eq!(types[0].name, "landsat8");
        assert_eq!(types[1].name, "s2_l2a");
        assert_eq!(index.count_rows(2).await.unwrap(), 40);
        assert!(matches!(index.count_rows(9).await, Err(DbError::NotFound(_))));
    }
}
