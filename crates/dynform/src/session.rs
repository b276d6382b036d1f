use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dynform_client::{FetchError, RemoteDataCache};
use dynform_spec::{
    FieldKind, FieldSpec, FieldTypeResolver, ResolvedFieldSpec, SchemaError, ValidationContract,
    check_field_list,
};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::submit::SubmissionCoordinator;

/// Form-level failures; nothing is rendered until one of these is retried away.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("unable to load the form definition: {0}")]
    MetadataFetch(#[source] FetchError),
    #[error("the form definition is malformed: {0}")]
    Schema(#[from] SchemaError),
    #[error("no form fields available")]
    EmptyForm,
}

impl SessionError {
    /// Whether a user-triggered reload can help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::MetadataFetch(_))
    }
}

/// Field-scoped failures of a choice-set lookup.
#[derive(Debug, Clone, Error)]
pub enum ChoiceError {
    #[error("no form is loaded")]
    NotLoaded,
    #[error("'{0}' is not a field of this form")]
    UnknownField(String),
    #[error("'{field_id}' resolves to {kind}, not choice")]
    NotChoice { field_id: String, kind: FieldKind },
    #[error("error loading options for '{field_id}': {source}")]
    Fetch {
        field_id: String,
        #[source]
        source: FetchError,
    },
    #[error("options for '{0}' arrived after the form was reloaded")]
    Stale(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceStatus {
    Loading,
    Ready(Arc<Vec<String>>),
    Failed(String),
}

/// Interaction readiness of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// Integer and text fields are ready as soon as the form is.
    Ready,
    /// A choice field whose options have not been requested yet.
    AwaitingChoices,
    Choices(ChoiceStatus),
}

impl FieldStatus {
    /// A choice field counts as ready once its lookup is in flight or completed.
    pub fn is_ready(&self) -> bool {
        !matches!(self, FieldStatus::AwaitingChoices)
    }
}

/// One resolved field list and its compiled contract.
#[derive(Debug)]
pub struct LoadedForm {
    generation: u64,
    source: Arc<Vec<FieldSpec>>,
    fields: Vec<ResolvedFieldSpec>,
    contract: Arc<ValidationContract>,
}

impl LoadedForm {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fields(&self) -> &[ResolvedFieldSpec] {
        &self.fields
    }

    pub fn field(&self, field_id: &str) -> Option<&ResolvedFieldSpec> {
        self.fields.iter().find(|field| field.id() == field_id)
    }

    pub fn contract(&self) -> &Arc<ValidationContract> {
        &self.contract
    }

    pub fn choice_fields(&self) -> impl Iterator<Item = &ResolvedFieldSpec> {
        self.fields.iter().filter(|field| field.is_choice())
    }
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    form: Option<Arc<LoadedForm>>,
    choices: HashMap<String, ChoiceStatus>,
}

/// Drives field list → resolution → contract → choice lookups for one form.
pub struct FormSession {
    cache: RemoteDataCache,
    resolver: FieldTypeResolver,
    state: Mutex<SessionState>,
}

impl FormSession {
    pub fn new(cache: RemoteDataCache, resolver: FieldTypeResolver) -> Self {
        Self {
            cache,
            resolver,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn cache(&self) -> &RemoteDataCache {
        &self.cache
    }

    pub fn current(&self) -> Option<Arc<LoadedForm>> {
        self.lock().form.clone()
    }

    /// Loads the form, reusing the current one when the cached field list is unchanged.
    pub async fn load(&self) -> Result<Arc<LoadedForm>, SessionError> {
        let list = self
            .cache
            .field_list()
            .await
            .map_err(SessionError::MetadataFetch)?;
        self.install(list)
    }

    /// User-triggered retry: always goes back to the service.
    pub async fn reload(&self) -> Result<Arc<LoadedForm>, SessionError> {
        let list = self
            .cache
            .refetch_field_list()
            .await
            .map_err(SessionError::MetadataFetch)?;
        self.install(list)
    }

    fn install(&self, list: Arc<Vec<FieldSpec>>) -> Result<Arc<LoadedForm>, SessionError> {
        check_field_list(&list)?;
        if list.is_empty() {
            return Err(SessionError::EmptyForm);
        }

        let mut state = self.lock();
        if let Some(current) = &state.form
            && Arc::ptr_eq(&current.source, &list)
        {
            return Ok(Arc::clone(current));
        }

        let fields = self.resolver.resolve_all(&list);
        for field in fields.iter().filter(|field| field.overridden) {
            debug!(
                field_id = field.id(),
                declared = %field.spec.declared_kind,
                resolved = %field.resolved_kind,
                "overriding declared field kind"
            );
        }
        let contract = Arc::new(ValidationContract::compile(&fields));

        state.generation += 1;
        state.choices.clear();
        let form = Arc::new(LoadedForm {
            generation: state.generation,
            source: list,
            fields,
            contract,
        });
        state.form = Some(Arc::clone(&form));
        info!(
            generation = form.generation,
            fields = form.fields.len(),
            "form loaded"
        );
        Ok(form)
    }

    /// Fetches options for a field that resolved to choice.
    ///
    /// Never touches the network for other kinds. A result that lands after the form
    /// has been replaced is discarded and reported as [`ChoiceError::Stale`].
    pub async fn load_choices(&self, field_id: &str) -> Result<Arc<Vec<String>>, ChoiceError> {
        let generation = {
            let mut state = self.lock();
            let form = state.form.clone().ok_or(ChoiceError::NotLoaded)?;
            let field = form
                .field(field_id)
                .ok_or_else(|| ChoiceError::UnknownField(field_id.to_string()))?;
            if !field.is_choice() {
                return Err(ChoiceError::NotChoice {
                    field_id: field_id.to_string(),
                    kind: field.resolved_kind,
                });
            }
            // Keep showing options already loaded while the cache revalidates them.
            if !matches!(state.choices.get(field_id), Some(ChoiceStatus::Ready(_))) {
                state
                    .choices
                    .insert(field_id.to_string(), ChoiceStatus::Loading);
            }
            form.generation
        };

        let result = self.cache.choice_set(field_id).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!(field_id, generation, "discarding options for a replaced form");
            return Err(ChoiceError::Stale(field_id.to_string()));
        }
        match result {
            Ok(options) => {
                state.choices.insert(
                    field_id.to_string(),
                    ChoiceStatus::Ready(Arc::clone(&options)),
                );
                Ok(options)
            }
            Err(source) => {
                warn!(field_id, error = %source, "failed to load options");
                state.choices.insert(
                    field_id.to_string(),
                    ChoiceStatus::Failed("Error loading options. Please try again.".into()),
                );
                Err(ChoiceError::Fetch {
                    field_id: field_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Requests options for every choice field of the current form concurrently.
    pub async fn load_all_choices(&self) -> Vec<(String, Result<Arc<Vec<String>>, ChoiceError>)> {
        let Some(form) = self.current() else {
            return Vec::new();
        };
        let ids: Vec<String> = form
            .choice_fields()
            .map(|field| field.id().to_string())
            .collect();
        let results = join_all(ids.iter().map(|id| self.load_choices(id))).await;
        ids.into_iter().zip(results).collect()
    }

    pub fn field_status(&self, field_id: &str) -> Option<FieldStatus> {
        let state = self.lock();
        let field = state.form.as_ref()?.field(field_id)?;
        if !field.is_choice() {
            return Some(FieldStatus::Ready);
        }
        Some(match state.choices.get(field_id) {
            Some(status) => FieldStatus::Choices(status.clone()),
            None => FieldStatus::AwaitingChoices,
        })
    }

    /// Starts a submission coordinator over the current form.
    pub fn coordinator(&self) -> Option<SubmissionCoordinator> {
        self.current()
            .map(|form| SubmissionCoordinator::new(form, self.cache.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
