use crate::app::{decode_first, decode_rows};
use crate::config::toml_config::TableNames;
use crate::domain::model::{
    AuthUser, NewTicket, Notification, OrderRecord, OrderStatus, Profile, Ticket, TicketStatus,
};
use crate::domain::ports::{SessionProvider, TableStore};
use crate::domain::query::{Query, SortDirection};
use crate::utils::error::{PortalError, Result};
use serde_json::json;
use std::sync::Arc;

/// 客戶後台：只看得到目前登入使用者的資料
pub struct ClientPortal {
    store: Arc<dyn TableStore>,
    session: Arc<dyn SessionProvider>,
    tables: TableNames,
}

impl ClientPortal {
    pub fn new(
        store: Arc<dyn TableStore>,
        session: Arc<dyn SessionProvider>,
        tables: TableNames,
    ) -> Self {
        Self {
            store,
            session,
            tables,
        }
    }

    async fn user(&self) -> Result<AuthUser> {
        self.session
            .current_user()
            .await
            .ok_or(PortalError::NotAuthenticated)
    }

    pub async fn my_orders(&self, status: Option<OrderStatus>) -> Result<Vec<OrderRecord>> {
        let user = self.user().await?;
        let mut query = Query::new().eq("user_id", &user.id);
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        let query = query.order("created_at", SortDirection::Desc);
        decode_rows(self.store.select(&self.tables.orders, &query).await?)
    }

    pub async fn order(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        let user = self.user().await?;
        let query = Query::new()
            .eq("id", order_id)
            .eq("user_id", &user.id)
            .limit(1);
        decode_first(self.store.select(&self.tables.orders, &query).await?)
    }

    pub async fn my_tickets(&self) -> Result<Vec<Ticket>> {
        let user = self.user().await?;
        let query = Query::new()
            .eq("user_id", &user.id)
            .order("created_at", SortDirection::Desc);
        decode_rows(self.store.select(&self.tables.tickets, &query).await?)
    }

    pub async fn open_ticket(
        &self,
        subject: &str,
        message: &str,
        order_id: Option<&str>,
    ) -> Result<Ticket> {
        let user = self.user().await?;
        if subject.trim().is_empty() || message.trim().is_empty() {
            return Err(PortalError::validation("ticket subject and message are required"));
        }
        let ticket = NewTicket {
            user_id: Some(user.id),
            order_id: order_id.map(str::to_string),
            subject: subject.trim().to_string(),
            message: message.trim().to_string(),
            status: TicketStatus::Open,
            priority: None,
        };
        let created = self
            .store
            .insert(&self.tables.tickets, serde_json::to_value(&ticket)?)
            .await?;
        Ok(serde_json::from_value(created)?)
    }

    pub async fn notifications(&self, unread_only: bool) -> Result<Vec<Notification>> {
        let user = self.user().await?;
        let mut query = Query::new().eq("user_id", &user.id);
        if unread_only {
            query = query.eq("read", false);
        }
        let query = query.order("created_at", SortDirection::Desc);
        decode_rows(self.store.select(&self.tables.notifications, &query).await?)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        let user = self.user().await?;
        let query = Query::new()
            .eq("id", notification_id)
            .eq("user_id", &user.id);
        self.store
            .update(&self.tables.notifications, &query, json!({ "read": true }))
            .await?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<Option<Profile>> {
        let user = self.user().await?;
        let query = Query::new().eq("id", &user.id).limit(1);
        decode_first(self.store.select(&self.tables.profiles, &query).await?)
    }

    pub async fn update_profile(&self, profile: &Profile) -> Result<Profile> {
        let user = self.user().await?;
        if profile.id != user.id {
            return Err(PortalError::PermissionDenied {
                message: "cannot edit another user's profile".to_string(),
            });
        }
        let patch = json!({
            "full_name": profile.full_name,
            "phone": profile.phone,
            "company": profile.company,
        });
        let query = Query::new().eq("id", &user.id);
        let rows = self
            .store
            .update(&self.tables.profiles, &query, patch)
            .await?;
        decode_first(rows)?.ok_or_else(|| PortalError::BackendError {
            status: 404,
            code: None,
            message: "profile not found".to_string(),
        })
    }
}
