#![allow(dead_code)]

use std::sync::Arc;

use dynform::FormSession;
use dynform_client::testing::ScriptedTransport;
use dynform_client::{ClientConfig, FetchError, RemoteDataCache, SubmitResponse};
use dynform_spec::FieldTypeResolver;

pub fn session_over(service: &Arc<ScriptedTransport>) -> FormSession {
    let cache = RemoteDataCache::new(service.clone(), ClientConfig::default());
    FormSession::new(cache, FieldTypeResolver::default())
}

pub fn ok_response(message: Option<&str>) -> Result<SubmitResponse, FetchError> {
    Ok(SubmitResponse {
        success: true,
        message: message.map(str::to_string),
    })
}
