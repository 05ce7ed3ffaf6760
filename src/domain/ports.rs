use crate::domain::model::AuthUser;
use crate::domain::query::Query;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 後端資料表存取（PostgREST 風格）
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<serde_json::Value>>;
    async fn insert(&self, table: &str, row: serde_json::Value) -> Result<serde_json::Value>;
    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: serde_json::Value,
    ) -> Result<Vec<serde_json::Value>>;
    async fn delete(&self, table: &str, query: &Query) -> Result<()>;
}

/// 遠端 serverless function 呼叫
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value>;
}

/// 登入狀態，透過參數注入給需要的元件
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_user(&self) -> Option<AuthUser>;
    async fn access_token(&self) -> Option<String>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthUser>;
    async fn logout(&self) -> Result<()>;
    async fn refresh(&self) -> Result<AuthUser>;
}
