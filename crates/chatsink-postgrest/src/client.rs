// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a PostgREST-compatible row store.
//!
//! Provides [`PostgrestStore`] which handles URL construction, service-key
//! authentication, and classification of failures into transient,
//! constraint, and terminal errors. It never retries on its own; the
//! entity resolver owns the retry budget.

use std::time::Duration;

use async_trait::async_trait;
use chatsink_config::model::StoreConfig;
use chatsink_core::types::{AdapterType, HealthStatus, Row};
use chatsink_core::{ChatsinkError, PluginAdapter, RowStore};
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::error::{classify_response, classify_transport};

/// Path prefix under which PostgREST exposes tables.
const REST_PREFIX: &str = "rest/v1";

/// Row store backed by PostgREST over HTTPS.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: Url,
    timeout: Duration,
}

impl PostgrestStore {
    /// Creates a new store client.
    ///
    /// # Arguments
    /// * `base_url` - Project URL, e.g. `https://project.example.co`
    /// * `service_key` - Elevated-privilege key sent as `apikey` and bearer token
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        service_key: &SecretString,
        timeout: Duration,
    ) -> Result<Self, ChatsinkError> {
        let mut rest_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ChatsinkError::Config(format!("invalid store url `{base_url}`: {e}")))?;
        if rest_url.cannot_be_a_base() {
            return Err(ChatsinkError::Config(format!(
                "store url `{base_url}` cannot be used as a base"
            )));
        }
        rest_url
            .path_segments_mut()
            .map_err(|()| ChatsinkError::Config(format!("invalid store url `{base_url}`")))?
            .pop_if_empty()
            .extend(REST_PREFIX.split('/'));

        let key = service_key.expose_secret();
        let mut apikey = HeaderValue::from_str(key)
            .map_err(|e| ChatsinkError::Config(format!("invalid service key header value: {e}")))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| ChatsinkError::Config(format!("invalid service key header value: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ChatsinkError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rest_url,
            timeout,
        })
    }

    /// Builds a client from the `[store]` section.
    ///
    /// Both the URL and the service key must be present.
    pub fn from_config(config: &StoreConfig) -> Result<Self, ChatsinkError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| ChatsinkError::Config("store.url is not set".into()))?;
        let key = config
            .service_key
            .clone()
            .map(SecretString::from)
            .ok_or_else(|| ChatsinkError::Config("store.service_key is not set".into()))?;
        Self::new(url, &key, Duration::from_secs(config.timeout_secs))
    }

    fn table_url(&self, table: &str) -> Result<Url, ChatsinkError> {
        validate_identifier("table", table)?;
        let mut url = self.rest_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChatsinkError::Internal("store url cannot be a base".into()))?
            .push(table);
        Ok(url)
    }

    async fn read_rows(
        &self,
        table: &str,
        response: reqwest::Response,
    ) -> Result<Vec<Row>, ChatsinkError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e, self.timeout))?;

        if !status.is_success() {
            return Err(classify_response(table, status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ChatsinkError::Backend {
            message: format!("unexpected response from `{table}`: {e}"),
        })
    }
}

/// Rejects names that are not plain SQL identifiers.
fn validate_identifier(kind: &str, name: &str) -> Result<(), ChatsinkError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ChatsinkError::Backend {
            message: format!("invalid {kind} name `{name}`"),
        })
    }
}

/// PostgREST filter operand for an equality match.
fn eq_filter(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

#[async_trait]
impl PluginAdapter for PostgrestStore {
    fn name(&self) -> &str {
        "postgrest"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatsinkError> {
        match self.client.get(self.rest_url.clone()).send().await {
            Ok(response) if response.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(response) => Ok(HealthStatus::Degraded(format!(
                "store returned {}",
                response.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn select_eq(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<Row>, ChatsinkError> {
        validate_identifier("column", column)?;
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair(column, &eq_filter(value))
            .append_pair("limit", "1");

        debug!(table, column, "store select");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.timeout))?;

        let rows = self.read_rows(table, response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, ChatsinkError> {
        let url = self.table_url(table)?;

        debug!(table, "store insert");
        let response = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.timeout))?;

        let rows = self.read_rows(table, response).await?;
        rows.into_iter().next().ok_or_else(|| ChatsinkError::Backend {
            message: format!("insert into `{table}` returned no row"),
        })
    }
}
