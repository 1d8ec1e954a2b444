//! Job execution error types
//!
//! Lets a job handler tell the queue whether a failure is worth another attempt
//! (recoverable) or should exhaust the job immediately (unrecoverable).

use std::fmt;

/// Job execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Create an unrecoverable error.
    ///
    /// The queue marks the job failed without consuming the remaining attempts.
    /// Use this when a retry cannot change the outcome, for example a payload that
    /// does not deserialize.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a recoverable error, retried according to the job's backoff policy.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Plain errors are retried.
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for Result to mark failures as unrecoverable
pub trait TaskResultExt<T> {
    fn unrecoverable(self) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("Malformed job payload"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Malformed job payload"));
    }

    #[test]
    fn test_from_anyhow_is_recoverable() {
        let err: TaskError = anyhow::anyhow!("Storage timeout").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("bad payload"));
        let err = result.unrecoverable().unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let wrapped: anyhow::Error = TaskError::unrecoverable(anyhow::anyhow!("gone")).into();
        let task_err = wrapped.downcast_ref::<TaskError>().unwrap();
        assert!(!task_err.is_recoverable());
    }
}
