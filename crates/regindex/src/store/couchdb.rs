//! CouchDB backend over the HTTP transport seam.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Document, DocumentStore, ID_FIELD, REV_FIELD, Result, StoreError};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Documents requested per `_find` round trip.
pub const FIND_PAGE_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
struct WriteResponse {
    id: String,
    rev: String,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<Map<String, Value>>,
    #[serde(default)]
    bookmark: Option<String>,
}

/// A single CouchDB database.
#[derive(Clone)]
pub struct CouchStore {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    database: String,
    authorization: Option<String>,
    find_page_size: usize,
}

impl CouchStore {
    /// Connect to `database` on the server at `url`.
    ///
    /// Credentials, when given, are sent as HTTP basic auth on every request.
    pub fn new(
        url: &str,
        database: &str,
        credentials: Option<(&str, &str)>,
        timeout: Duration,
    ) -> Result<Self> {
        if database.is_empty() {
            return Err(StoreError::Config("database name is empty".to_string()));
        }
        let transport =
            ReqwestTransport::with_timeout(timeout).map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(
            url,
            database,
            credentials,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        url: &str,
        database: &str,
        credentials: Option<(&str, &str)>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let authorization = credentials
            .map(|(user, password)| format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))));
        Self {
            transport,
            base_url: url.trim_end_matches('/').to_string(),
            database: database.to_string(),
            authorization,
            find_page_size: FIND_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_find_page_size(mut self, size: usize) -> Self {
        self.find_page_size = size.max(1);
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn db_url(&self) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(&self.database))
    }

    /// Ids are percent-encoded again for the URL path, so a stored id
    /// containing `%2F` travels as `%252F`.
    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.db_url(), urlencoding::encode(id))
    }

    async fn send(&self, method: HttpMethod, url: String, body: Option<&Value>) -> Result<HttpResponse> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(auth) = &self.authorization {
            headers.push(("Authorization".to_string(), auth.clone()));
        }

        let mut request = HttpRequest::new(method, url, headers);
        if let Some(body) = body {
            request = request.with_json_body(serde_json::to_vec(body)?);
        }

        self.transport
            .send(request)
            .await
            .map_err(|e| StoreError::Http(e.to_string()))
    }

    /// Run a `_find` query, following bookmarks until the result is
    /// exhausted. `field` limits the returned documents to that field.
    async fn find_all(&self, selector: Value, field: Option<&str>) -> Result<Vec<Document>> {
        let url = format!("{}/_find", self.db_url());
        let mut documents = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut query = json!({
                "selector": selector,
                "limit": self.find_page_size,
            });
            if let Some(field) = field {
                query["fields"] = json!([field]);
            }
            if let Some(bookmark) = &bookmark {
                query["bookmark"] = Value::from(bookmark.as_str());
            }

            let response = self.send(HttpMethod::Post, url.clone(), Some(&query)).await?;
            if response.status != 200 {
                return Err(api_error(response.status, &response));
            }

            let page: FindResponse = serde_json::from_slice(&response.body)?;
            let count = page.docs.len();
            documents.extend(page.docs.into_iter().map(Document::new));

            if count < self.find_page_size || page.bookmark.is_none() {
                break;
            }
            bookmark = page.bookmark;
        }

        Ok(documents)
    }

    /// Create the database if it does not exist yet.
    pub async fn ensure_database(&self) -> Result<()> {
        let response = self.send(HttpMethod::Put, self.db_url(), None).await?;
        match response.status {
            201 | 202 => {
                tracing::info!(database = %self.database, "Created database");
                Ok(())
            }
            412 => Ok(()),
            status => Err(api_error(status, &response)),
        }
    }
}

fn api_error(status: u16, response: &HttpResponse) -> StoreError {
    StoreError::Api {
        status,
        message: response.text().trim().to_string(),
    }
}

#[async_trait]
impl DocumentStore for CouchStore {
    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let response = self.send(HttpMethod::Get, self.doc_url(id), None).await?;
        match response.status {
            200 => Ok(Some(Document::new(serde_json::from_slice(&response.body)?))),
            404 => Ok(None),
            status => Err(api_error(status, &response)),
        }
    }

    async fn put(&self, id: &str, rev: Option<&str>, mut body: Map<String, Value>) -> Result<Document> {
        body.insert(ID_FIELD.to_string(), Value::from(id));
        match rev {
            Some(rev) => body.insert(REV_FIELD.to_string(), Value::from(rev)),
            None => body.remove(REV_FIELD),
        };

        let payload = Value::Object(body);
        let response = self
            .send(HttpMethod::Put, self.doc_url(id), Some(&payload))
            .await?;

        match response.status {
            201 | 202 => {
                let written: WriteResponse = serde_json::from_slice(&response.body)?;
                let Value::Object(mut body) = payload else {
                    return Err(StoreError::InvalidDocument(id.to_string()));
                };
                body.insert(ID_FIELD.to_string(), Value::from(written.id));
                body.insert(REV_FIELD.to_string(), Value::from(written.rev));
                Ok(Document::new(body))
            }
            409 => Err(StoreError::Conflict { id: id.to_string() }),
            status => Err(api_error(status, &response)),
        }
    }

    async fn delete(&self, id: &str, rev: &str) -> Result<()> {
        let url = format!("{}?rev={}", self.doc_url(id), urlencoding::encode(rev));
        let response = self.send(HttpMethod::Delete, url, None).await?;
        match response.status {
            200 | 202 => Ok(()),
            404 => Err(StoreError::NotFound { id: id.to_string() }),
            409 => Err(StoreError::Conflict { id: id.to_string() }),
            status => Err(api_error(status, &response)),
        }
    }

    async fn find(&self, field: &str, value: &Value) -> Result<Vec<Document>> {
        self.find_all(json!({ field: value }), None).await
    }

    async fn distinct(&self, field: &str) -> Result<BTreeSet<String>> {
        let docs = self
            .find_all(json!({ field: { "$exists": true } }), Some(field))
            .await?;
        Ok(docs
            .iter()
            .filter_map(|doc| doc.get(field).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn ensure_index(&self, field: &str) -> Result<()> {
        let url = format!("{}/_index", self.db_url());
        let body = json!({
            "index": { "fields": [field] },
            "name": field,
            "ddoc": format!("regindex-{field}"),
            "type": "json",
        });
        let response = self.send(HttpMethod::Post, url, Some(&body)).await?;
        match response.status {
            200 | 201 => Ok(()),
            status => Err(api_error(status, &response)),
        }
    }
}
