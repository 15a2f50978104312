use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcctlError {
    /// Credential or session failure against an external system. Fatal:
    /// nothing downstream can succeed without a valid session, so the run
    /// aborts instead of recording a per-step failure.
    #[error("authentication failed for {system}: {detail}")]
    Auth { system: String, detail: String },

    /// The account (or ticket, group, person) is absent in the target
    /// system. Callers treat this as already-satisfied.
    #[error("not found in {system}: {what}")]
    NotFound { system: String, what: String },

    /// Network or timeout failure. Eligible for a single retry, after which
    /// it is surfaced as a step failure.
    #[error("transient failure talking to {system}: {detail}")]
    Transient { system: String, detail: String },

    /// Bad input row or an undeterminable separation status. The record is
    /// skipped and the batch continues.
    #[error("validation: {0}")]
    Validation(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("credentials file not found for {system}: {path}")]
    CredentialsNotFound { system: String, path: String },

    #[error("required command '{0}' not found on PATH")]
    CliMissing(String),

    #[error("command '{command}' failed: {detail}")]
    CliFailed { command: String, detail: String },

    #[error("ticketing API returned unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("could not generate a unique user id for '{first} {last}'")]
    UserIdExhausted { first: String, last: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AcctlError {
    pub fn auth(system: impl Into<String>, detail: impl Into<String>) -> Self {
        AcctlError::Auth {
            system: system.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(system: impl Into<String>, what: impl Into<String>) -> Self {
        AcctlError::NotFound {
            system: system.into(),
            what: what.into(),
        }
    }

    pub fn transient(system: impl Into<String>, detail: impl Into<String>) -> Self {
        AcctlError::Transient {
            system: system.into(),
            detail: detail.into(),
        }
    }

    /// True for failures that must abort the whole run rather than be
    /// recorded as one step's failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcctlError::Auth { .. }
                | AcctlError::CliMissing(_)
                | AcctlError::ConfigNotFound(_)
                | AcctlError::CredentialsNotFound { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AcctlError::Transient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AcctlError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, AcctlError>;
