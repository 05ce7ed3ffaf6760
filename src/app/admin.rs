use crate::app::analytics::{summarize, OrderAnalytics};
use crate::app::{decode_first, decode_rows};
use crate::config::toml_config::{FunctionNames, TableNames};
use crate::domain::model::{
    Autolink, DiagnosticEntry, OrderRecord, OrderStatus, QueueEntry, SeoTemplate, Setting, Ticket,
    TicketStatus,
};
use crate::domain::ports::{FunctionInvoker, TableStore};
use crate::domain::query::{Query, SortDirection};
use crate::utils::error::{PortalError, Result};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub service_type: Option<String>,
    /// 依 e-mail 部分比對
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl OrderFilter {
    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(status) = self.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(service) = &self.service_type {
            query = query.eq("service_type", service);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.ilike("email", format!("*{}*", search));
        }
        query = query.order("created_at", SortDirection::Desc);
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

#[derive(Debug, Serialize)]
struct OrderCsvRow<'a> {
    id: &'a str,
    created_at: String,
    service_type: &'a str,
    name: &'a str,
    email: &'a str,
    price: u64,
    status: &'a str,
    payment_method: &'a str,
}

/// 管理後台：所有資料表的列表 / 編輯，以及手動觸發遠端流程
pub struct AdminDashboard {
    store: Arc<dyn TableStore>,
    functions: Arc<dyn FunctionInvoker>,
    tables: TableNames,
    function_names: FunctionNames,
}

impl AdminDashboard {
    pub fn new(
        store: Arc<dyn TableStore>,
        functions: Arc<dyn FunctionInvoker>,
        tables: TableNames,
        function_names: FunctionNames,
    ) -> Self {
        Self {
            store,
            functions,
            tables,
            function_names,
        }
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>> {
        let rows = self
            .store
            .select(&self.tables.orders, &filter.to_query())
            .await?;
        decode_rows(rows)
    }

    pub async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<OrderRecord> {
        let query = Query::new().eq("id", order_id);
        let rows = self
            .store
            .update(&self.tables.orders, &query, json!({ "status": status.as_str() }))
            .await?;
        tracing::info!("📝 Order {} set to {}", order_id, status.as_str());
        decode_first(rows)?.ok_or_else(|| not_found("order", order_id))
    }

    pub async fn delete_order(&self, order_id: &str) -> Result<()> {
        self.store
            .delete(&self.tables.orders, &Query::new().eq("id", order_id))
            .await
    }

    pub async fn analytics(&self, filter: &OrderFilter) -> Result<OrderAnalytics> {
        let orders = self.list_orders(filter).await?;
        Ok(summarize(&orders))
    }

    pub async fn list_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>> {
        let mut query = Query::new();
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        let query = query.order("created_at", SortDirection::Desc);
        decode_rows(self.store.select(&self.tables.tickets, &query).await?)
    }

    pub async fn update_ticket_status(&self, ticket_id: &str, status: TicketStatus) -> Result<Ticket> {
        let query = Query::new().eq("id", ticket_id);
        let rows = self
            .store
            .update(&self.tables.tickets, &query, json!({ "status": status.as_str() }))
            .await?;
        decode_first(rows)?.ok_or_else(|| not_found("ticket", ticket_id))
    }

    pub async fn seo_templates(&self) -> Result<Vec<SeoTemplate>> {
        let query = Query::new().order("name", SortDirection::Asc);
        decode_rows(self.store.select(&self.tables.seo_templates, &query).await?)
    }

    pub async fn save_seo_template(&self, template: &SeoTemplate) -> Result<SeoTemplate> {
        self.upsert(&self.tables.seo_templates, template.id.as_deref(), template)
            .await
    }

    pub async fn delete_seo_template(&self, id: &str) -> Result<()> {
        self.store
            .delete(&self.tables.seo_templates, &Query::new().eq("id", id))
            .await
    }

    pub async fn autolinks(&self) -> Result<Vec<Autolink>> {
        let query = Query::new().order("keyword", SortDirection::Asc);
        decode_rows(self.store.select(&self.tables.autolinks, &query).await?)
    }

    pub async fn save_autolink(&self, autolink: &Autolink) -> Result<Autolink> {
        crate::utils::validation::validate_url("autolink.url", &autolink.url)?;
        self.upsert(&self.tables.autolinks, autolink.id.as_deref(), autolink)
            .await
    }

    pub async fn delete_autolink(&self, id: &str) -> Result<()> {
        self.store
            .delete(&self.tables.autolinks, &Query::new().eq("id", id))
            .await
    }

    pub async fn settings(&self) -> Result<Vec<Setting>> {
        let query = Query::new().order("key", SortDirection::Asc);
        decode_rows(self.store.select(&self.tables.settings, &query).await?)
    }

    /// 先更新，沒有對應的 key 再新增
    pub async fn set_setting(&self, key: &str, value: serde_json::Value) -> Result<Setting> {
        let query = Query::new().eq("key", key);
        let rows = self
            .store
            .update(&self.tables.settings, &query, json!({ "value": value }))
            .await?;
        if let Some(setting) = decode_first(rows)? {
            return Ok(setting);
        }
        let created = self
            .store
            .insert(&self.tables.settings, json!({ "key": key, "value": value }))
            .await?;
        Ok(serde_json::from_value(created)?)
    }

    pub async fn diagnostics(&self, limit: usize) -> Result<Vec<DiagnosticEntry>> {
        let query = Query::new()
            .order("created_at", SortDirection::Desc)
            .limit(limit);
        decode_rows(self.store.select(&self.tables.diagnostics, &query).await?)
    }

    pub async fn order_queue(&self, limit: usize) -> Result<Vec<QueueEntry>> {
        let query = Query::new()
            .order("created_at", SortDirection::Asc)
            .limit(limit);
        decode_rows(self.store.select(&self.tables.order_queue, &query).await?)
    }

    pub async fn reprocess_stuck_orders(&self) -> Result<serde_json::Value> {
        self.functions
            .invoke(&self.function_names.reprocess_stuck_orders, json!({}))
            .await
    }

    pub async fn run_system_diagnostics(&self) -> Result<serde_json::Value> {
        self.functions
            .invoke(&self.function_names.system_diagnostics, json!({}))
            .await
    }

    pub async fn process_order(&self, order_id: &str) -> Result<serde_json::Value> {
        self.functions
            .invoke(
                &self.function_names.process_order,
                json!({ "order_id": order_id }),
            )
            .await
    }

    async fn upsert<T>(&self, table: &str, id: Option<&str>, row: &T) -> Result<T>
    where
        T: Serialize + serde::de::DeserializeOwned + Sync,
    {
        let value = serde_json::to_value(row)?;
        match id {
            Some(id) => {
                let rows = self
                    .store
                    .update(table, &Query::new().eq("id", id), value)
                    .await?;
                decode_first(rows)?.ok_or_else(|| not_found(table, id))
            }
            None => Ok(serde_json::from_value(self.store.insert(table, value).await?)?),
        }
    }
}

fn not_found(kind: &str, id: &str) -> PortalError {
    PortalError::BackendError {
        status: 404,
        code: None,
        message: format!("{} {} not found", kind, id),
    }
}

/// 匯出訂單為 CSV，回傳寫入筆數
pub fn export_orders_csv<W: std::io::Write>(orders: &[OrderRecord], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for order in orders {
        csv_writer.serialize(OrderCsvRow {
            id: &order.id,
            created_at: order
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            service_type: &order.service_type,
            name: &order.name,
            email: &order.email,
            price: order.price,
            status: order.status.as_str(),
            payment_method: order.payment_method.as_deref().unwrap_or(""),
        })?;
    }
    csv_writer.flush()?;
    Ok(orders.len())
}
