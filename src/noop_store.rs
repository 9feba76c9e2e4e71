use crate::error::StoreError;
use crate::row::LogRow;
use crate::store::LogStore;
use async_trait::async_trait;

/// A store that accepts and discards every batch.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// external I/O, and for tests that don't care about persistence.
#[derive(Clone, Debug, Default)]
pub struct NoopStore;

#[async_trait]
impl LogStore for NoopStore {
    async fn connect(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_batch(&mut self, _rows: &[LogRow]) -> Result<(), StoreError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "noop".to_string()
    }
}
