use async_trait::async_trait;
use dynform_spec::FieldSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FetchError;

/// Body returned by `POST /save`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One round trip per call; caching and retries live above this trait.
#[async_trait]
pub trait FormTransport: Send + Sync {
    /// `GET /form`
    async fn field_list(&self) -> Result<Vec<FieldSpec>, FetchError>;
    /// `GET /choice/{id}`
    async fn choice_set(&self, field_id: &str) -> Result<Vec<String>, FetchError>;
    /// `POST /save`
    async fn submit(&self, payload: &Map<String, Value>) -> Result<SubmitResponse, FetchError>;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use dynform_spec::FieldSpec;
    use reqwest::{Client, Response};
    use serde::de::DeserializeOwned;
    use serde_json::{Map, Value};
    use tracing::debug;
    use url::Url;

    use super::{FormTransport, SubmitResponse};
    use crate::config::ClientConfig;
    use crate::error::FetchError;

    /// reqwest-backed transport against the form service's three endpoints.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
        base: Url,
    }

    impl HttpTransport {
        pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
            let base = config.base()?;
            let client = Client::builder()
                .timeout(config.request_timeout)
                .user_agent(concat!("dynform/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|err| FetchError::Network(err.to_string()))?;
            Ok(Self { client, base })
        }

        pub fn base_url(&self) -> &Url {
            &self.base
        }

        fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
            self.base
                .join(path)
                .map_err(|err| FetchError::Url(format!("{path}: {err}")))
        }

        fn choice_endpoint(&self, field_id: &str) -> Result<Url, FetchError> {
            let mut url = self.endpoint("choice/")?;
            url.path_segments_mut()
                .map_err(|_| FetchError::Url(format!("{} cannot be a base", self.base)))?
                .pop_if_empty()
                .push(field_id);
            Ok(url)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().filter(|body| !body.is_empty());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[async_trait]
    impl FormTransport for HttpTransport {
        async fn field_list(&self) -> Result<Vec<FieldSpec>, FetchError> {
            let url = self.endpoint("form")?;
            debug!(%url, "GET field list");
            let response = self.client.get(url).send().await?;
            decode(response).await
        }

        async fn choice_set(&self, field_id: &str) -> Result<Vec<String>, FetchError> {
            let url = self.choice_endpoint(field_id)?;
            debug!(%url, field_id, "GET choice set");
            let response = self.client.get(url).send().await?;
            decode(response).await
        }

        async fn submit(&self, payload: &Map<String, Value>) -> Result<SubmitResponse, FetchError> {
            let url = self.endpoint("save")?;
            debug!(%url, fields = payload.len(), "POST submission");
            let response = self.client.post(url).json(payload).send().await?;
            decode(response).await
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn endpoints_keep_base_path() {
            let config = ClientConfig::default().with_base_url("http://localhost:9000/api");
            let transport = HttpTransport::new(&config).expect("transport");
            assert_eq!(
                transport.endpoint("form").expect("form").as_str(),
                "http://localhost:9000/api/form"
            );
            assert_eq!(
                transport.choice_endpoint("fav colour").expect("choice").as_str(),
                "http://localhost:9000/api/choice/fav%20colour"
            );
        }
    }
}
