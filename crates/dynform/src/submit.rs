use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dynform_client::RemoteDataCache;
use dynform_spec::{ErrorCode, FieldError, FieldKind, FormValues};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::session::LoadedForm;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Form submitted successfully!";
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to submit form. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Error,
}

/// Banner shown after a submission attempt; replaced by the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub kind: OutcomeKind,
    pub message: String,
}

impl SubmissionOutcome {
    fn success(message: Option<String>) -> Self {
        Self {
            kind: OutcomeKind::Success,
            message: message
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
        }
    }

    fn failure() -> Self {
        Self {
            kind: OutcomeKind::Error,
            message: GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

/// Reasons a submission never reached the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("{} field(s) failed validation", errors.len() + unknown_fields.len())]
    Invalid {
        errors: Vec<FieldError>,
        unknown_fields: Vec<String>,
    },
}

struct FormState {
    phase: SubmissionPhase,
    values: FormValues,
    errors: BTreeMap<String, FieldError>,
    outcome: Option<SubmissionOutcome>,
}

/// Validates, coerces and transmits one form's values; single-flight per instance.
pub struct SubmissionCoordinator {
    form: Arc<LoadedForm>,
    cache: RemoteDataCache,
    state: Mutex<FormState>,
}

impl SubmissionCoordinator {
    pub fn new(form: Arc<LoadedForm>, cache: RemoteDataCache) -> Self {
        Self {
            form,
            cache,
            state: Mutex::new(FormState {
                phase: SubmissionPhase::Idle,
                values: FormValues::new(),
                errors: BTreeMap::new(),
                outcome: None,
            }),
        }
    }

    pub fn form(&self) -> &Arc<LoadedForm> {
        &self.form
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.lock().phase
    }

    pub fn values(&self) -> FormValues {
        self.lock().values.clone()
    }

    pub fn outcome(&self) -> Option<SubmissionOutcome> {
        self.lock().outcome.clone()
    }

    pub fn field_error(&self, field_id: &str) -> Option<FieldError> {
        self.lock().errors.get(field_id).cloned()
    }

    pub fn errors(&self) -> Vec<FieldError> {
        self.lock().errors.values().cloned().collect()
    }

    /// Stores `raw` for `field_id` and re-validates only that field.
    ///
    /// Ids outside the contract are rejected and nothing is stored.
    pub fn set_value(&self, field_id: &str, raw: impl Into<String>) -> Result<(), FieldError> {
        let raw = raw.into();
        let check = self.form.contract().validate_field(field_id, &raw);
        if let Err(error) = &check
            && error.code == ErrorCode::UnknownField
        {
            return Err(error.clone());
        }

        let mut state = self.lock();
        state.values.set(field_id, raw);
        match check {
            Ok(checked) => {
                state.errors.remove(field_id);
                if let Some(note) = checked.review {
                    warn!(field_id, note = note.describe(), "value flagged for review");
                }
                Ok(())
            }
            Err(error) => {
                state.errors.insert(field_id.to_string(), error.clone());
                Err(error)
            }
        }
    }

    /// Applies every value, returning the errors of those that failed.
    pub fn set_values(&self, values: &FormValues) -> Vec<FieldError> {
        values
            .iter()
            .filter_map(|(field_id, raw)| self.set_value(field_id, raw).err())
            .collect()
    }

    /// Validates the whole form and, when it passes, transmits the coerced payload.
    ///
    /// Transport and service failures are reported as an error outcome, not as `Err`;
    /// the values are kept so the user can resubmit.
    pub async fn submit(&self) -> Result<SubmissionOutcome, SubmitError> {
        let payload = {
            let mut state = self.lock();
            if matches!(
                state.phase,
                SubmissionPhase::Validating | SubmissionPhase::Submitting
            ) {
                return Err(SubmitError::InFlight);
            }
            state.phase = SubmissionPhase::Validating;
            state.outcome = None;

            let report = self.form.contract().evaluate(&state.values);
            for review in &report.review {
                warn!(
                    field_id = %review.field_id,
                    note = review.note.describe(),
                    "value flagged for review"
                );
            }
            if !report.valid {
                state.errors = report
                    .errors
                    .iter()
                    .map(|error| (error.field_id.clone(), error.clone()))
                    .collect();
                state.phase = SubmissionPhase::Idle;
                return Err(SubmitError::Invalid {
                    errors: report.errors,
                    unknown_fields: report.unknown_fields,
                });
            }

            self.warn_unlisted_choices(&state.values);
            state.errors.clear();
            state.phase = SubmissionPhase::Submitting;
            report.payload
        };

        let guard = SubmittingGuard {
            coordinator: self,
            armed: true,
        };
        let result = self.cache.submit(&payload).await;
        guard.disarm();

        let mut state = self.lock();
        let outcome = match result {
            Ok(response) if response.success => {
                info!(fields = payload.len(), "form submitted");
                state.values.clear();
                state.phase = SubmissionPhase::Succeeded;
                SubmissionOutcome::success(response.message)
            }
            Ok(response) => {
                warn!(message = ?response.message, "service rejected submission");
                state.phase = SubmissionPhase::Failed;
                SubmissionOutcome::failure()
            }
            Err(err) => {
                warn!(error = %err, "submission failed");
                state.phase = SubmissionPhase::Failed;
                SubmissionOutcome::failure()
            }
        };
        state.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    // Membership is not enforced; an unlisted choice is only worth a log line.
    fn warn_unlisted_choices(&self, values: &FormValues) {
        for field in self.form.fields() {
            if field.resolved_kind != FieldKind::Choice {
                continue;
            }
            let (Some(value), Some(options)) = (
                values.get(field.id()),
                self.cache.cached_choice_set(field.id()),
            ) else {
                continue;
            };
            if !options.iter().any(|option| option == value) {
                warn!(
                    field_id = field.id(),
                    value, "submitting a value outside the fetched options"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the form to `Idle` when a submission is dropped mid-request, so the
/// next attempt is not rejected as in flight. The values are left untouched.
struct SubmittingGuard<'a> {
    coordinator: &'a SubmissionCoordinator,
    armed: bool,
}

impl SubmittingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.coordinator.lock();
        if state.phase == SubmissionPhase::Submitting {
            warn!("submission abandoned before the service answered");
            state.phase = SubmissionPhase::Idle;
        }
    }
}
