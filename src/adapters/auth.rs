use crate::adapters::supabase::{check_response, join_url, normalize_base_url};
use crate::domain::model::AuthUser;
use crate::domain::ports::SessionProvider;
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    user: AuthUser,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Self {
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user,
        }
    }
}

/// 以 `/auth/v1` 的密碼登入與 refresh token 維持登入狀態
pub struct SupabaseAuth {
    base_url: Url,
    anon_key: String,
    client: Client,
    session: RwLock<Option<Session>>,
}

impl SupabaseAuth {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            anon_key: anon_key.into(),
            client: Client::new(),
            session: RwLock::new(None),
        })
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn grant(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthUser> {
        let mut url = join_url(&self.base_url, "auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = match check_response(response).await {
            Ok(response) => response.json().await?,
            Err(PortalError::BackendError { message, .. }) => {
                return Err(PortalError::AuthError { message })
            }
            Err(e) => return Err(e),
        };

        let session = Session::from(token);
        let user = session.user.clone();
        *self.session.write().await = Some(session);
        Ok(user)
    }
}

#[async_trait]
impl SessionProvider for SupabaseAuth {
    async fn current_user(&self) -> Option<AuthUser> {
        self.session.read().await.as_ref().map(|s| s.user.clone())
    }

    /// 過期時先用 refresh token 換新；換不到就清掉登入狀態，改用 anon key
    async fn access_token(&self) -> Option<String> {
        {
            let session = self.session.read().await;
            match session.as_ref() {
                None => return None,
                Some(s) if !s.is_expired(Utc::now()) => return Some(s.access_token.clone()),
                Some(_) => {}
            }
        }

        tracing::debug!("Access token expired, refreshing session");
        if let Err(e) = self.refresh().await {
            tracing::warn!("⚠️ Session refresh failed, signing out: {}", e);
            self.session.write().await.take();
            return None;
        }

        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        let user = self
            .grant("password", json!({ "email": email, "password": password }))
            .await?;
        tracing::info!("🔑 Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
        Ok(user)
    }

    async fn logout(&self) -> Result<()> {
        let token = match self.session.write().await.take() {
            Some(session) => session.access_token,
            None => return Ok(()),
        };

        // 本地狀態已清除，遠端登出失敗只記錄
        let url = join_url(&self.base_url, "auth/v1/logout")?;
        let result = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await;
        match result {
            Ok(response) => {
                if let Err(e) = check_response(response).await {
                    tracing::warn!("⚠️ Remote logout failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("⚠️ Remote logout failed: {}", e),
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<AuthUser> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(PortalError::NotAuthenticated)?;
        self.grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }
}

/// 固定的登入狀態，CLI 匿名模式與測試使用
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Option<AuthUser>,
    token: Option<String>,
}

impl StaticSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: AuthUser, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn current_user(&self) -> Option<AuthUser> {
        self.user.clone()
    }

    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<AuthUser> {
        Err(PortalError::AuthError {
            message: "static session does not support login".to_string(),
        })
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }

    async fn refresh(&self) -> Result<AuthUser> {
        self.user.clone().ok_or(PortalError::NotAuthenticated)
    }
}
