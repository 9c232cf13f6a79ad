//! # Remote HTTP Storage
//!
//! Forwards every mapper call to a store server over REST.
//!
//! Each collection lives under `/api/...` and supports:
//! - `GET    {path}` list keys
//! - `POST   {path}` create
//! - `PUT    {path}/{key}` edit
//! - `GET    {path}/{key}` read
//! - `DELETE {path}/{key}` delete (returns the removed document)
//! - `POST   {path}/search` search with a serialized [`Query`]
//!
//! Keys and container names are percent-encoded as single path segments,
//! so `a#b` or `a/b` never change the route.

use crate::primitives::API_PREFIX;
use crate::query::Query;
use crate::store::{Resource, ResourceMapper};
use crate::MlgateError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

/// Blocking client for one store server.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    /// Create a client for `base_url` (no trailing slash), with optional
    /// bearer token.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional bearer auth.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        let mut req = self.http.request(method, &url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send a request and map transport failures.
    fn send(&self, req: RequestBuilder) -> Result<Response, MlgateError> {
        req.send()
            .map_err(|e| MlgateError::Backend(format!("cannot reach {}: {e}", self.base_url)))
    }

    /// Map status codes to store errors and decode the JSON body.
    fn handle<T: DeserializeOwned>(
        &self,
        resp: Response,
        kind: &str,
        key: &str,
    ) -> Result<T, MlgateError> {
        let status = resp.status();
        match status {
            StatusCode::NOT_FOUND => return Err(MlgateError::not_found(kind, key)),
            StatusCode::CONFLICT => return Err(MlgateError::already_exists(kind, key)),
            s if !s.is_success() => {
                let body = resp.text().unwrap_or_default();
                return Err(MlgateError::Backend(format!("server error ({s}): {body}")));
            }
            _ => {}
        }
        resp.json::<T>()
            .map_err(|e| MlgateError::Serialization(e.to_string()))
    }

    pub fn mapper<R: Resource>(&self, path: impl Into<String>) -> HttpMapper<R> {
        HttpMapper {
            client: self.clone(),
            path: path.into(),
            _resource: PhantomData,
        }
    }
}

/// Mapper over one remote collection.
pub struct HttpMapper<R> {
    client: HttpClient,
    path: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> HttpMapper<R> {
    fn item_path(&self, key: &str) -> String {
        format!("{}/{}", self.path, segment(key))
    }
}

impl<R: Resource> ResourceMapper for HttpMapper<R> {
    type Resource = R;

    fn create(&mut self, resource: R) -> Result<R, MlgateError> {
        let key = resource.key();
        let req = self.client.request(Method::POST, &self.path).json(&resource);
        let resp = self.client.send(req)?;
        debug!(kind = R::KIND, key = %key, path = %self.path, "http create");
        self.client.handle(resp, R::KIND, &key)
    }

    fn edit(&mut self, resource: R) -> Result<R, MlgateError> {
        let key = resource.key();
        let req = self
            .client
            .request(Method::PUT, &self.item_path(&key))
            .json(&resource);
        let resp = self.client.send(req)?;
        self.client.handle(resp, R::KIND, &key)
    }

    fn read(&mut self, key: &str) -> Result<R, MlgateError> {
        let req = self.client.request(Method::GET, &self.item_path(key));
        let resp = self.client.send(req)?;
        self.client.handle(resp, R::KIND, key)
    }

    fn list(&mut self) -> Result<Vec<String>, MlgateError> {
        let req = self.client.request(Method::GET, &self.path);
        let resp = self.client.send(req)?;
        self.client.handle(resp, "collection", &self.path)
    }

    fn delete(&mut self, key: &str) -> Result<R, MlgateError> {
        let req = self.client.request(Method::DELETE, &self.item_path(key));
        let resp = self.client.send(req)?;
        debug!(kind = R::KIND, key = %key, path = %self.path, "http delete");
        self.client.handle(resp, R::KIND, key)
    }

    fn search(&mut self, query: &Query) -> Result<Vec<R>, MlgateError> {
        let req = self
            .client
            .request(Method::POST, &format!("{}/search", self.path))
            .json(query);
        let resp = self.client.send(req)?;
        self.client.handle(resp, "collection", &self.path)
    }
}

// =============================================================================
// PATHS
// =============================================================================

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

pub fn namespaces_path() -> String {
    "/namespace".to_string()
}

pub fn models_path(namespace: &str) -> String {
    format!("/namespace/{}/model", segment(namespace))
}

pub fn versions_path(namespace: &str, model: &str) -> String {
    format!("{}/{}/version", models_path(namespace), segment(model))
}

pub fn artifacts_path(namespace: &str, model: &str, version: &str) -> String {
    format!("{}/{}/artifact", versions_path(namespace, model), segment(version))
}

pub fn catalog_path() -> String {
    "/catalog/entry".to_string()
}

pub fn custom_list_path(list: &str) -> String {
    format!("/custom_list/{}/entry", segment(list))
}

/// User-store collections map straight to `/user`, `/group`, `/permission`.
pub fn user_store_path(collection: &str) -> String {
    format!("/{collection}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_the_context() {
        assert_eq!(
            artifacts_path("ns", "m", "v1"),
            "/namespace/ns/model/m/version/v1/artifact"
        );
        assert_eq!(custom_list_path("qa_categories"), "/custom_list/qa_categories/entry");
        assert_eq!(user_store_path("permission"), "/permission");
    }

    #[test]
    fn names_stay_inside_one_segment() {
        assert_eq!(segment("a#b"), "a%23b");
        assert_eq!(segment("a/b"), "a%2Fb");
        assert_eq!(segment("what? now"), "what%3F%20now");
        assert_eq!(segment("v1.0-rc_2~"), "v1.0-rc_2~");
        assert_eq!(segment("é"), "%C3%A9");
        assert_eq!(
            artifacts_path("team a", "m#1", "v?"),
            "/namespace/team%20a/model/m%231/version/v%3F/artifact"
        );

        let client = HttpClient::new("http://localhost:8000", None);
        let mapper = client.mapper::<crate::model::Group>(user_store_path("group"));
        assert_eq!(mapper.item_path("ops/../admin"), "/group/ops%2F..%2Fadmin");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpClient::new("http://localhost:8000/", None);
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn unreachable_server_is_a_backend_error() {
        // Port 9 (discard) is closed on test machines.
        let client = HttpClient::new("http://127.0.0.1:9", None);
        let mut mapper = client.mapper::<crate::model::Group>(user_store_path("group"));
        assert!(matches!(mapper.list(), Err(MlgateError::Backend(_))));
    }
}
