use crate::error::Result;

/// Outcome of a retried operation, carrying how many retries it took.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Run `op`, retrying exactly once if it fails with a transient error.
/// Any other error, or a second transient failure, is returned as-is.
pub fn with_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<Retried<T>> {
    match op() {
        Ok(value) => Ok(Retried { value, retries: 0 }),
        Err(e) if e.is_transient() => {
            tracing::warn!("transient failure, retrying once: {e}");
            let value = op()?;
            Ok(Retried { value, retries: 1 })
        }
        Err(e) => Err(e),
    }
}
