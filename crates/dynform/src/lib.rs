#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod session;
pub mod submit;

pub use config::{AppConfig, ConfigError};
pub use session::{ChoiceError, ChoiceStatus, FieldStatus, FormSession, LoadedForm, SessionError};
pub use submit::{
    OutcomeKind, SubmissionCoordinator, SubmissionOutcome, SubmissionPhase, SubmitError,
};
