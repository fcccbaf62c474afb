//! ArangoDB storage driver over the HTTP API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};

use aqldb_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    provision::IndexSpec,
};

/// A connection to one ArangoDB database.
///
/// All operations go through the server's HTTP API with basic
/// authentication. Database management calls (`create_database` and friends)
/// address the `_system` database; everything else addresses the configured
/// one.
#[derive(Debug)]
pub struct ArangoStore {
    client: Client,
    /// Server base URL, without a trailing slash.
    server: String,
    database: String,
    username: String,
    password: Option<String>,
}

impl ArangoStore {
    /// Creates a builder for constructing an `ArangoStore`.
    pub fn builder(server: &str, database: &str) -> ArangoStoreBuilder {
        ArangoStoreBuilder::new(server, database)
    }

    fn api(&self, path: &str) -> String {
        format!("{}/_db/{}/_api/{}", self.server, self.database, path)
    }

    fn system_api(&self, path: &str) -> String {
        format!("{}/_db/_system/_api/{}", self.server, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, self.password.as_deref())
    }

    /// Sends a request and parses the JSON response, mapping non-success
    /// statuses to backend errors carrying the server's error body.
    async fn send(&self, request: RequestBuilder) -> StoreResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !status.is_success() {
            let message = body["errorMessage"].as_str().unwrap_or("unknown error");
            return Err(StoreError::Backend(format!("{status}: {message}")));
        }
        Ok(body)
    }

    async fn send_json(&self, method: Method, url: String, body: &Value) -> StoreResult<Value> {
        self.send(self.request(method, url).json(body)).await
    }

    /// Extracts the post-write document from a `returnNew=true` response.
    fn written(mut body: Value) -> StoreResult<Value> {
        match body["new"].take() {
            Value::Null => Err(StoreError::Backend(
                "write response carried no document".to_string(),
            )),
            document => Ok(document),
        }
    }
}

#[async_trait]
impl StoreBackend for ArangoStore {
    async fn execute(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<Vec<Value>> {
        let body = json!({ "query": query, "bindVars": bind_vars });
        let mut payload = self
            .send_json(Method::POST, self.api("cursor"), &body)
            .await?;

        let mut rows = match payload["result"].take() {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        };

        // Drain the cursor: the server caps each batch.
        while payload["hasMore"].as_bool().unwrap_or(false) {
            let id = payload["id"]
                .as_str()
                .ok_or_else(|| StoreError::Backend("cursor without an id".to_string()))?
                .to_string();
            payload = self
                .send(self.request(Method::PUT, self.api(&format!("cursor/{id}"))))
                .await?;
            if let Value::Array(batch) = payload["result"].take() {
                rows.extend(batch);
            }
        }

        Ok(rows)
    }

    async fn save_document(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let url = format!("{}?returnNew=true", self.api(&format!("document/{collection}")));
        Self::written(self.send_json(Method::POST, url, &document).await?)
    }

    // `id` is collection-qualified already, so the document endpoints
    // ignore the collection argument.

    async fn update_document(&self, _collection: &str, id: &str, patch: Value) -> StoreResult<Value> {
        let url = format!("{}?returnNew=true", self.api(&format!("document/{id}")));
        Self::written(self.send_json(Method::PATCH, url, &patch).await?)
    }

    async fn replace_document(
        &self,
        _collection: &str,
        id: &str,
        document: Value,
    ) -> StoreResult<Value> {
        let url = format!("{}?returnNew=true", self.api(&format!("document/{id}")));
        Self::written(self.send_json(Method::PUT, url, &document).await?)
    }

    async fn remove_document(&self, _collection: &str, id: &str) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, self.api(&format!("document/{id}"))))
            .await?;
        Ok(())
    }

    async fn save_documents(
        &self,
        collection: &str,
        documents: Vec<Value>,
    ) -> StoreResult<Vec<Value>> {
        let url = format!("{}?returnNew=true", self.api(&format!("document/{collection}")));
        let body = Value::Array(documents);
        let payload = self.send_json(Method::POST, url, &body).await?;

        let Value::Array(entries) = payload else {
            return Err(StoreError::Backend(
                "batch write response was not a list".to_string(),
            ));
        };
        entries.into_iter().map(Self::written).collect()
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.send_json(Method::POST, self.api("collection"), &json!({ "name": name }))
            .await?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, self.api(&format!("collection/{name}"))))
            .await?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> StoreResult<bool> {
        let response = self
            .request(Method::GET, self.api(&format!("collection/{name}")))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StoreError::Backend(format!("{status}"))),
        }
    }

    async fn ensure_index(&self, collection: &str, spec: &IndexSpec) -> StoreResult<()> {
        // The server answers an identical definition with the existing
        // index, so re-ensuring is safe.
        let url = format!("{}?collection={collection}", self.api("index"));
        self.send_json(Method::POST, url, &spec.as_body()).await?;
        Ok(())
    }

    async fn create_view(&self, name: &str, properties: Value) -> StoreResult<()> {
        let mut body = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("name".to_string(), Value::String(name.to_string()));
        body.insert("type".to_string(), Value::String("arangosearch".to_string()));

        self.send_json(Method::POST, self.api("view"), &Value::Object(body))
            .await?;
        Ok(())
    }

    async fn list_views(&self) -> StoreResult<Vec<String>> {
        let payload = self
            .send(self.request(Method::GET, self.api("view")))
            .await?;

        let names = payload["result"]
            .as_array()
            .map(|views| {
                views
                    .iter()
                    .filter_map(|view| view["name"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    async fn ensure_analyzer(&self, name: &str, properties: Value) -> StoreResult<()> {
        let mut body = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("name".to_string(), Value::String(name.to_string()));

        let result = self
            .send_json(Method::POST, self.api("analyzer"), &Value::Object(body))
            .await;
        match result {
            Ok(_) => Ok(()),
            // An analyzer of that name already exists.
            Err(StoreError::Backend(message)) if message.starts_with("409") => {
                tracing::debug!(analyzer = name, "analyzer already present");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn create_database(&self, name: &str) -> StoreResult<()> {
        self.send_json(
            Method::POST,
            self.system_api("database"),
            &json!({ "name": name }),
        )
        .await?;
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> StoreResult<()> {
        self.send(self.request(Method::DELETE, self.system_api(&format!("database/{name}"))))
            .await?;
        Ok(())
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let payload = self
            .send(self.request(Method::GET, self.system_api("database")))
            .await?;

        let names = payload["result"]
            .as_array()
            .map(|databases| {
                databases
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }
}

/// Builder for constructing [`ArangoStore`] connections.
///
/// # Example
///
/// ```ignore
/// use aqldb_arango::ArangoStore;
/// use aqldb_core::backend::StoreBackendBuilder;
///
/// let backend = ArangoStore::builder("http://localhost:8529", "app")
///     .auth("root", "secret")
///     .build()
///     .await?;
/// ```
pub struct ArangoStoreBuilder {
    server: String,
    database: String,
    username: String,
    password: Option<String>,
}

impl ArangoStoreBuilder {
    pub fn new(server: &str, database: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            database: database.to_string(),
            username: "root".to_string(),
            password: None,
        }
    }

    /// Sets the credentials used for basic authentication.
    pub fn auth(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = Some(password.to_string());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for ArangoStoreBuilder {
    type Backend = ArangoStore;

    /// Builds the connection and checks the server is reachable.
    async fn build(self) -> StoreResult<Self::Backend> {
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        let store = ArangoStore {
            client,
            server: self.server,
            database: self.database,
            username: self.username,
            password: self.password,
        };

        let version = store
            .send(store.request(Method::GET, format!("{}/_api/version", store.server)))
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;
        tracing::debug!(
            version = version["version"].as_str().unwrap_or("unknown"),
            "connected to ArangoDB"
        );

        Ok(store)
    }
}
