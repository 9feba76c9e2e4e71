use crate::error::StoreError;
use crate::row::LogRow;
use async_trait::async_trait;

/// Relational destination for batches of [`LogRow`]s.
///
/// A store is owned exclusively by one [`BatchWriter`](crate::writer::BatchWriter)
/// task, which is the only caller of these methods. Implementations keep
/// their connection inside `self`, hence the `&mut self` receivers.
#[async_trait]
pub trait LogStore: Send {
    /// Open (or reopen) the underlying connection.
    ///
    /// **Returns**
    /// - `Ok(())` when the store is ready to accept `insert_batch`.
    /// - `Err(StoreError::Connect(..))` when the destination is unreachable.
    ///   The writer stays disconnected and retries before its next batch.
    async fn connect(&mut self) -> Result<(), StoreError>;

    /// Persist all rows as a single unit.
    ///
    /// **Parameters**
    /// - `rows`: rows in enqueue order, never empty.
    ///
    /// **Returns**
    /// - `Ok(())` once the whole batch has been committed.
    /// - `Err(..)` if anything failed. Implementations must roll back so
    ///   that no partial batch is left behind; the writer then treats the
    ///   connection as lost and counts the whole batch as failed.
    async fn insert_batch(&mut self, rows: &[LogRow]) -> Result<(), StoreError>;

    /// Release the connection. Errors are swallowed.
    async fn close(&mut self) {}

    /// Short human-readable description of the destination, used in
    /// diagnostics. Must not include credentials.
    fn describe(&self) -> String {
        "log store".to_string()
    }
}

#[async_trait]
impl<S: LogStore + ?Sized> LogStore for Box<S> {
    async fn connect(&mut self) -> Result<(), StoreError> {
        (**self).connect().await
    }

    async fn insert_batch(&mut self, rows: &[LogRow]) -> Result<(), StoreError> {
        (**self).insert_batch(rows).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
