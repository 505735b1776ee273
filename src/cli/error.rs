//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        ApplicationError::Domain(e).into()
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => crate::exitcode::IOERR,
                InfraError::Taxdump { .. } => crate::exitcode::DATAERR,
                InfraError::Application(app) => match app {
                    ApplicationError::Domain(DomainError::MalformedIdentifier(_))
                    | ApplicationError::Domain(DomainError::InvalidTag(_))
                    | ApplicationError::Domain(DomainError::InvalidLinkMethod(_)) => {
                        crate::exitcode::USAGE
                    }
                    ApplicationError::Domain(_) => crate::exitcode::DATAERR,
                    ApplicationError::PersistedStateCorrupt { .. } => crate::exitcode::DATAERR,
                    ApplicationError::Lookup(_) => crate::exitcode::NOINPUT,
                    ApplicationError::Config { .. } => crate::exitcode::CONFIG,
                    ApplicationError::OperationFailed { .. } => crate::exitcode::IOERR,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaxonId;
    use std::path::PathBuf;

    #[test]
    fn given_conflicts_when_exit_code_then_dataerr() {
        let err: CliError = DomainError::LineageConflict("1 conflict(s)".into()).into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_malformed_id_when_exit_code_then_usage() {
        let err: CliError = DomainError::MalformedIdentifier("abc".into()).into();
        assert_eq!(err.exit_code(), crate::exitcode::USAGE);
    }

    #[test]
    fn given_unknown_taxon_when_exit_code_then_dataerr() {
        let err: CliError = DomainError::UnknownTaxon(TaxonId::new(7)).into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_corrupt_state_when_exit_code_then_dataerr() {
        let err: CliError = ApplicationError::PersistedStateCorrupt {
            path: PathBuf::from("/tmp/taxlink.toml"),
            message: "bad".into(),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::DATAERR);
    }

    #[test]
    fn given_config_error_when_exit_code_then_config() {
        let err: CliError = ApplicationError::Config {
            message: "x".into(),
        }
        .into();
        assert_eq!(err.exit_code(), crate::exitcode::CONFIG);
    }
}
