use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 單一欄位的答案，型別需和 `FieldKind` 對應
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldAnswer {
    Text(String),
    Choice(String),
    Choices(BTreeSet<String>),
    Number(i64),
    Flag(bool),
}

impl FieldAnswer {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldAnswer::Text(text) | FieldAnswer::Choice(text) => text.trim().is_empty(),
            FieldAnswer::Choices(choices) => choices.is_empty(),
            FieldAnswer::Number(_) | FieldAnswer::Flag(_) => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldAnswer::Text(_) => "text",
            FieldAnswer::Choice(_) => "select",
            FieldAnswer::Choices(_) => "multiselect",
            FieldAnswer::Number(_) => "range",
            FieldAnswer::Flag(_) => "checkbox",
        }
    }
}

impl fmt::Display for FieldAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldAnswer::Text(text) | FieldAnswer::Choice(text) => write!(f, "{}", text),
            FieldAnswer::Choices(choices) => {
                let joined: Vec<&str> = choices.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(", "))
            }
            FieldAnswer::Number(n) => write!(f, "{}", n),
            FieldAnswer::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

/// 付款方式。卡片只接受金流商回傳的 token，不接受卡號
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Checkout,
    Invoice,
    Card {
        #[serde(default, skip_serializing)]
        token: String,
    },
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Checkout => "checkout",
            PaymentMethod::Invoice => "invoice",
            PaymentMethod::Card { .. } => "card",
        }
    }
}

/// 訂單表單狀態，隨使用者輸入逐欄更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFormState {
    pub service_id: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, FieldAnswer>,
    pub length_tier: Option<String>,
    pub word_count: Option<u32>,
    #[serde(default)]
    pub add_ons: BTreeSet<String>,
    pub delivery_tier: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    pub payment_method: Option<PaymentMethod>,
}

impl OrderFormState {
    pub fn for_service(service_id: impl Into<String>) -> Self {
        Self {
            service_id: Some(service_id.into()),
            ..Default::default()
        }
    }

    /// 切換服務時清掉與舊服務相關的選項
    pub fn select_service(&mut self, service_id: impl Into<String>) {
        let service_id = service_id.into();
        if self.service_id.as_deref() != Some(service_id.as_str()) {
            self.answers.clear();
            self.length_tier = None;
            self.add_ons.clear();
            self.delivery_tier = None;
        }
        self.service_id = Some(service_id);
    }

    pub fn set_answer(&mut self, key: impl Into<String>, answer: FieldAnswer) {
        self.answers.insert(key.into(), answer);
    }

    pub fn clear_answer(&mut self, key: &str) -> Option<FieldAnswer> {
        self.answers.remove(key)
    }

    /// 回傳切換後是否為選取狀態
    pub fn toggle_add_on(&mut self, key: &str) -> bool {
        if self.add_ons.remove(key) {
            false
        } else {
            self.add_ons.insert(key.to_string());
            true
        }
    }

    pub fn select_length_tier(&mut self, key: impl Into<String>) {
        self.length_tier = Some(key.into());
    }

    pub fn set_word_count(&mut self, words: u32) {
        self.word_count = Some(words);
    }

    pub fn select_delivery(&mut self, key: impl Into<String>) {
        self.delivery_tier = Some(key.into());
    }

    pub fn set_contact(&mut self, contact: ContactInfo) {
        self.contact = contact;
    }

    pub fn select_payment(&mut self, method: PaymentMethod) {
        self.payment_method = Some(method);
    }
}

/// 價格試算結果，不會被保存
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub base_price: u64,
    pub add_ons_total: u64,
    pub urgency_surcharge: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    InProgress,
    Review,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Review => "review",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "in_progress" => Ok(OrderStatus::InProgress),
            "review" => Ok(OrderStatus::Review),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// 送往後端 `orders` 資料表的扁平記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub service_type: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub details: String,
    pub service_options: serde_json::Value,
    pub price: u64,
    pub payment_method: Option<String>,
    pub status: OrderStatus,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub service_type: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub service_options: serde_json::Value,
    pub price: u64,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    pub payment_status: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
    #[serde(other)]
    Unknown,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub user_id: Option<String>,
    pub order_id: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: TicketStatus,
    pub priority: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub user_id: Option<String>,
    pub order_id: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub page_type: String,
    pub title_template: String,
    pub meta_description_template: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autolink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub keyword: String,
    pub url: String,
    pub max_links_per_page: Option<u32>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub check_name: String,
    pub status: String,
    pub message: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// 後端處理佇列中的項目，此處只讀取顯示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub order_id: Option<String>,
    pub status: String,
    pub attempts: Option<u32>,
    pub last_error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub order_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

/// 已登入使用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
