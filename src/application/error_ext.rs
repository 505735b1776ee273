//! Context helpers for turning low-level failures into `OperationFailed`

use std::error::Error;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Attach an action (and optionally a path) to any fallible result.
///
/// Works for `io::Result`, walkdir and toml results alike.
pub trait IoResultExt<T> {
    /// # Example
    /// ```ignore
    /// fs.hard_link(&file, &object)
    ///     .with_path_context("hardlink into store", &object)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;

    fn with_context(self, action: &str) -> ApplicationResult<T>;
}

impl<T, E> IoResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }

    fn with_context(self, action: &str) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: action.to_string(),
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn given_io_error_when_path_context_then_message_names_path() {
        let result: io::Result<()> = Err(io::Error::from(io::ErrorKind::NotFound));

        let err = result
            .with_path_context("open file", Path::new("/tmp/x.fa"))
            .unwrap_err();

        assert_eq!(err.to_string(), "operation failed: open file: /tmp/x.fa");
        assert!(err.source().is_some());
    }

    #[test]
    fn given_ok_when_context_then_value_passes_through() {
        let result: io::Result<u8> = Ok(7);
        assert_eq!(result.with_context("anything").unwrap(), 7);
    }
}
