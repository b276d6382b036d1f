use std::sync::Arc;

use dynform_spec::FieldSpec;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::info;

use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::retry::run_with_retry;
use crate::transport::{FormTransport, SubmitResponse};

struct Inner {
    transport: Arc<dyn FormTransport>,
    config: ClientConfig,
    field_list: QueryCache<(), Vec<FieldSpec>>,
    choice_sets: QueryCache<String, Vec<String>>,
}

/// Cached, retrying, de-duplicating access to the form service.
///
/// Cheap to clone; clones share the same caches.
#[derive(Clone)]
pub struct RemoteDataCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RemoteDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDataCache")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl RemoteDataCache {
    pub fn new(transport: Arc<dyn FormTransport>, config: ClientConfig) -> Self {
        let field_list = QueryCache::new("field_list", config.cache.field_list_fresh_for);
        let choice_sets = QueryCache::new("choice_set", config.cache.choice_set_fresh_for);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                field_list,
                choice_sets,
            }),
        }
    }

    /// Builds a cache over the reqwest transport described by `config`.
    #[cfg(feature = "http")]
    pub fn http(config: ClientConfig) -> Result<Self, FetchError> {
        let transport = crate::transport::HttpTransport::new(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn field_list(&self) -> Result<Arc<Vec<FieldSpec>>, FetchError> {
        let fetch = self.field_list_fetch();
        self.inner.field_list.get((), fetch).await
    }

    /// Bypasses freshness; used when the user asks to retry loading the form.
    pub async fn refetch_field_list(&self) -> Result<Arc<Vec<FieldSpec>>, FetchError> {
        let fetch = self.field_list_fetch();
        self.inner.field_list.refetch((), fetch).await
    }

    /// Choice set for `field_id`. Callers only ask for fields resolved as choices.
    pub async fn choice_set(&self, field_id: &str) -> Result<Arc<Vec<String>>, FetchError> {
        let transport = Arc::clone(&self.inner.transport);
        let config = self.inner.config.clone();
        let id = field_id.to_string();
        self.inner
            .choice_sets
            .get(field_id.to_string(), move || async move {
                let policy = config.retry;
                run_with_retry(
                    "choice_set",
                    &policy,
                    policy.metadata_retries,
                    config.request_timeout,
                    || transport.choice_set(&id),
                )
                .await
            })
            .await
    }

    pub fn cached_choice_set(&self, field_id: &str) -> Option<Arc<Vec<String>>> {
        self.inner.choice_sets.peek(&field_id.to_string())
    }

    pub fn invalidate_choice_set(&self, field_id: &str) {
        self.inner.choice_sets.invalidate(&field_id.to_string());
    }

    pub fn invalidate_all(&self) {
        self.inner.field_list.invalidate_all();
        self.inner.choice_sets.invalidate_all();
    }

    /// Sends a normalized payload with the smaller submission retry budget.
    pub async fn submit(&self, payload: &Map<String, Value>) -> Result<SubmitResponse, FetchError> {
        let policy = self.inner.config.retry;
        let transport = &self.inner.transport;
        let response = run_with_retry(
            "submit",
            &policy,
            policy.submission_retries,
            self.inner.config.request_timeout,
            || transport.submit(payload),
        )
        .await?;
        info!(success = response.success, "submission answered");
        Ok(response)
    }

    fn field_list_fetch(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<FieldSpec>, FetchError>> + use<> {
        let transport = Arc::clone(&self.inner.transport);
        let config = self.inner.config.clone();
        move || {
            async move {
                let policy = config.retry;
                run_with_retry(
                    "field_list",
                    &policy,
                    policy.metadata_retries,
                    config.request_timeout,
                    || transport.field_list(),
                )
                .await
            }
            .boxed()
        }
    }
}
