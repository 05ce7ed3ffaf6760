use crate::domain::ports::{FunctionInvoker, SessionProvider, TableStore};
use crate::domain::query::Query;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// PostgREST / function 錯誤回應的常見欄位
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    details: Option<String>,
}

pub(crate) fn normalize_base_url(base_url: &str) -> Result<Url> {
    let with_slash = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    Url::parse(&with_slash).map_err(|e| PortalError::InvalidConfigValueError {
        field: "backend.url".to_string(),
        value: base_url.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })
}

pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(|e| PortalError::ConfigError {
        message: format!("cannot build URL for '{}': {}", path, e),
    })
}

/// 非 2xx 回應轉成 `BackendError`，成功則原樣回傳
pub(crate) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .or(body.error_description)
        .or(body.msg)
        .or(body.error)
        .or(body.details)
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text.clone()
            }
        });

    tracing::debug!("Backend error {}: {}", status, text);
    Err(PortalError::BackendError {
        status: status.as_u16(),
        code: body.code,
        message,
    })
}

#[derive(Clone)]
pub struct SupabaseClient {
    base_url: Url,
    anon_key: String,
    schema: Option<String>,
    client: Client,
    session: Option<Arc<dyn SessionProvider>>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            anon_key: anon_key.into(),
            schema: None,
            client: Client::new(),
            session: None,
        })
    }

    /// 有登入時改用使用者的 access token
    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn bearer(&self) -> String {
        match &self.session {
            Some(session) => session
                .access_token()
                .await
                .unwrap_or_else(|| self.anon_key.clone()),
            None => self.anon_key.clone(),
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = join_url(&self.base_url, path)?;
        tracing::debug!("{} {}", method, url);

        let is_read = method == Method::GET;
        let mut builder = self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer().await);

        if let Some(schema) = &self.schema {
            let header = if is_read {
                "Accept-Profile"
            } else {
                "Content-Profile"
            };
            builder = builder.header(header, schema);
        }
        Ok(builder)
    }

    fn table_path(table: &str) -> String {
        format!("rest/v1/{}", table)
    }

    fn require_filters(table: &str, query: &Query, action: &str) -> Result<()> {
        if query.filters().is_empty() {
            return Err(PortalError::validation(format!(
                "refusing to {} every row of '{}' without a filter",
                action, table
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<serde_json::Value>> {
        let response = self
            .request(Method::GET, &Self::table_path(table))
            .await?
            .query(&query.to_pairs())
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check_response(response).await?.json().await?;
        tracing::debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .request(Method::POST, &Self::table_path(table))
            .await?
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        let created: serde_json::Value = check_response(response).await?.json().await?;

        match created {
            serde_json::Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
            serde_json::Value::Array(_) => Err(PortalError::BackendError {
                status: 200,
                code: None,
                message: format!("insert into '{}' returned no row", table),
            }),
            other => Ok(other),
        }
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: serde_json::Value,
    ) -> Result<Vec<serde_json::Value>> {
        Self::require_filters(table, query, "update")?;
        let response = self
            .request(Method::PATCH, &Self::table_path(table))
            .await?
            .query(&query.filters_only().to_pairs())
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        Self::require_filters(table, query, "delete")?;
        let response = self
            .request(Method::DELETE, &Self::table_path(table))
            .await?
            .query(&query.filters_only().to_pairs())
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionInvoker for SupabaseClient {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        tracing::info!("⚡ Invoking function {}", name);
        let response = self
            .request(Method::POST, &format!("functions/v1/{}", name))
            .await?
            .json(&body)
            .send()
            .await?;
        let text = check_response(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = normalize_base_url("https://abc.supabase.co").unwrap();
        assert_eq!(
            join_url(&url, "rest/v1/orders").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/orders"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(normalize_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_delete_without_filter_is_refused() {
        let client = SupabaseClient::new("http://localhost:54321", "anon").unwrap();
        let err = client.delete("orders", &Query::new()).await.unwrap_err();
        assert!(matches!(err, PortalError::ValidationError { .. }));
    }
}
