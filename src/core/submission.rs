//! 訂單送出：把表單攤平成後端記錄，再依序執行各個獨立步驟。
//!
//! 預設步驟為「建立訂單 → 通知 function → 使用者站內通知」。只有建立訂單
//! 失敗會中止；後面兩步失敗只記錄在報告裡，不重試也不回滾。

use crate::core::pricing::PriceCalculator;
use crate::domain::catalog::ServiceConfig;
use crate::domain::model::{
    AuthUser, NewNotification, NewOrder, OrderFormState, OrderRecord, OrderStatus, PriceEstimate,
};
use crate::domain::ports::{FunctionInvoker, TableStore};
use crate::utils::error::{PortalError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionAdapter {
    calculator: PriceCalculator,
}

impl SubmissionAdapter {
    pub fn new(calculator: PriceCalculator) -> Self {
        Self { calculator }
    }

    /// 價格直接取自計價器，確保預覽與送出的金額一致
    pub fn build_record(
        &self,
        service: &ServiceConfig,
        form: &OrderFormState,
        user_id: Option<&str>,
    ) -> Result<(NewOrder, PriceEstimate)> {
        let estimate = self.calculator.estimate(service, form)?;

        let record = NewOrder {
            service_type: service.id.clone(),
            name: form.contact.name.trim().to_string(),
            email: form.contact.email.trim().to_string(),
            phone: non_empty(form.contact.phone.as_deref()),
            company: non_empty(form.contact.company.as_deref()),
            details: render_details(service, form),
            service_options: service_options(form, &estimate)?,
            price: estimate.total,
            payment_method: form.payment_method.as_ref().map(|m| m.as_str().to_string()),
            status: OrderStatus::Pending,
            user_id: user_id.map(str::to_string),
        };

        Ok((record, estimate))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// 依目錄欄位順序輸出可讀的 details 文字
pub fn render_details(service: &ServiceConfig, form: &OrderFormState) -> String {
    let mut lines = vec![format!("Service: {}", service.name)];

    for field in &service.fields {
        if let Some(answer) = form.answers.get(&field.key) {
            if !answer.is_blank() {
                lines.push(field.render_answer(answer));
            }
        }
    }

    if let Some(tier) = form.length_tier.as_deref() {
        let label = service
            .length_tier(tier)
            .and_then(|t| t.label.clone())
            .unwrap_or_else(|| tier.to_string());
        lines.push(format!("Length: {}", label));
    }
    if let Some(words) = form.word_count {
        lines.push(format!("Word count: {}", words));
    }
    if !form.add_ons.is_empty() {
        let labels: Vec<String> = form
            .add_ons
            .iter()
            .map(|key| {
                service
                    .add_on(key)
                    .map(|a| a.label.clone())
                    .unwrap_or_else(|| key.clone())
            })
            .collect();
        lines.push(format!("Add-ons: {}", labels.join(", ")));
    }
    if let Some(key) = form.delivery_tier.as_deref() {
        let line = match service.delivery_tier(key) {
            Some(tier) => match tier.days {
                Some(days) => format!("Delivery: {} ({} days)", tier.label, days),
                None => format!("Delivery: {}", tier.label),
            },
            None => format!("Delivery: {}", key),
        };
        lines.push(line);
    }

    lines.join("\n")
}

fn service_options(form: &OrderFormState, estimate: &PriceEstimate) -> Result<serde_json::Value> {
    Ok(json!({
        "length_tier": form.length_tier,
        "word_count": form.word_count,
        "add_ons": form.add_ons,
        "delivery_tier": form.delivery_tier,
        "answers": serde_json::to_value(&form.answers)?,
        "estimate": serde_json::to_value(estimate)?,
    }))
}

#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub record: NewOrder,
    pub estimate: PriceEstimate,
    pub user: Option<AuthUser>,
    pub order: Option<OrderRecord>,
}

impl SubmissionContext {
    pub fn new(record: NewOrder, estimate: PriceEstimate, user: Option<AuthUser>) -> Self {
        Self {
            record,
            estimate,
            user,
            order: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    LogAndContinue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: String,
    pub status: StepStatus,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub order: OrderRecord,
    pub estimate: PriceEstimate,
    pub outcomes: Vec<StepOutcome>,
}

impl SubmissionReport {
    pub fn outcome(&self, step: &str) -> Option<&StepStatus> {
        self.outcomes
            .iter()
            .find(|o| o.step == step)
            .map(|o| &o.status)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, StepStatus::Failed(_)))
    }
}

#[async_trait]
pub trait SubmissionStep: Send + Sync {
    fn name(&self) -> &str;

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::LogAndContinue
    }

    fn should_execute(&self, _context: &SubmissionContext) -> bool {
        true
    }

    async fn execute(&self, context: &mut SubmissionContext) -> Result<()>;
}

pub const CREATE_ORDER_STEP: &str = "create_order";
pub const DISPATCH_NOTIFICATION_STEP: &str = "dispatch_notification";
pub const USER_NOTIFICATION_STEP: &str = "user_notification";

pub struct CreateOrderStep {
    store: Arc<dyn TableStore>,
    table: String,
}

impl CreateOrderStep {
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl SubmissionStep for CreateOrderStep {
    fn name(&self) -> &str {
        CREATE_ORDER_STEP
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Abort
    }

    async fn execute(&self, context: &mut SubmissionContext) -> Result<()> {
        let row = serde_json::to_value(&context.record)?;
        let created = self.store.insert(&self.table, row).await?;
        let order: OrderRecord = serde_json::from_value(created)?;
        tracing::info!("📝 Order {} created ({} {})", order.id, order.service_type, order.price);
        context.order = Some(order);
        Ok(())
    }
}

pub struct DispatchNotificationStep {
    functions: Arc<dyn FunctionInvoker>,
    function_name: String,
}

impl DispatchNotificationStep {
    pub fn new(functions: Arc<dyn FunctionInvoker>, function_name: impl Into<String>) -> Self {
        Self {
            functions,
            function_name: function_name.into(),
        }
    }
}

#[async_trait]
impl SubmissionStep for DispatchNotificationStep {
    fn name(&self) -> &str {
        DISPATCH_NOTIFICATION_STEP
    }

    fn should_execute(&self, context: &SubmissionContext) -> bool {
        context.order.is_some()
    }

    async fn execute(&self, context: &mut SubmissionContext) -> Result<()> {
        let order = context.order.as_ref().ok_or_else(|| PortalError::SubmissionError {
            step: DISPATCH_NOTIFICATION_STEP.to_string(),
            details: "no order in context".to_string(),
        })?;
        let body = json!({
            "type": "new_order",
            "order_id": order.id,
            "service_type": order.service_type,
            "name": order.name,
            "email": order.email,
            "price": order.price,
            "details": order.details,
        });
        self.functions.invoke(&self.function_name, body).await?;
        Ok(())
    }
}

pub struct UserNotificationStep {
    store: Arc<dyn TableStore>,
    table: String,
}

impl UserNotificationStep {
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl SubmissionStep for UserNotificationStep {
    fn name(&self) -> &str {
        USER_NOTIFICATION_STEP
    }

    // 匿名下單時沒有對象可以通知
    fn should_execute(&self, context: &SubmissionContext) -> bool {
        context.user.is_some() && context.order.is_some()
    }

    async fn execute(&self, context: &mut SubmissionContext) -> Result<()> {
        let (user, order) = match (&context.user, &context.order) {
            (Some(user), Some(order)) => (user, order),
            _ => return Ok(()),
        };
        let notification = NewNotification {
            user_id: user.id.clone(),
            title: "Order received".to_string(),
            message: format!(
                "Your {} order has been received. Total: {}",
                order.service_type, order.price
            ),
            kind: "order_created".to_string(),
            order_id: Some(order.id.clone()),
        };
        self.store
            .insert(&self.table, serde_json::to_value(&notification)?)
            .await?;
        Ok(())
    }
}

/// 依序執行送出步驟
pub struct SubmissionPipeline {
    steps: Vec<Box<dyn SubmissionStep>>,
}

impl Default for SubmissionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// 建立訂單 → 通知 → 站內通知
    pub fn standard(
        store: Arc<dyn TableStore>,
        functions: Arc<dyn FunctionInvoker>,
        orders_table: &str,
        notifications_table: &str,
        notify_function: &str,
    ) -> Self {
        let mut pipeline = Self::new();
        pipeline.add_step(Box::new(CreateOrderStep::new(store.clone(), orders_table)));
        pipeline.add_step(Box::new(DispatchNotificationStep::new(
            functions,
            notify_function,
        )));
        pipeline.add_step(Box::new(UserNotificationStep::new(store, notifications_table)));
        pipeline
    }

    pub fn add_step(&mut self, step: Box<dyn SubmissionStep>) {
        self.steps.push(step);
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, mut context: SubmissionContext) -> Result<SubmissionReport> {
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let start = Instant::now();

            if !step.should_execute(&context) {
                tracing::info!("⏭️ Skipping submission step: {}", step.name());
                outcomes.push(StepOutcome {
                    step: step.name().to_string(),
                    status: StepStatus::Skipped,
                    duration: start.elapsed(),
                });
                continue;
            }

            match step.execute(&mut context).await {
                Ok(()) => {
                    tracing::debug!("Submission step {} succeeded", step.name());
                    outcomes.push(StepOutcome {
                        step: step.name().to_string(),
                        status: StepStatus::Succeeded,
                        duration: start.elapsed(),
                    });
                }
                Err(e) => match step.failure_policy() {
                    FailurePolicy::Abort => {
                        tracing::error!("❌ Submission step {} failed: {}", step.name(), e);
                        return Err(e);
                    }
                    FailurePolicy::LogAndContinue => {
                        tracing::warn!(
                            "⚠️ Submission step {} failed, continuing: {}",
                            step.name(),
                            e
                        );
                        outcomes.push(StepOutcome {
                            step: step.name().to_string(),
                            status: StepStatus::Failed(e.to_string()),
                            duration: start.elapsed(),
                        });
                    }
                },
            }
        }

        let order = context.order.ok_or_else(|| PortalError::SubmissionError {
            step: CREATE_ORDER_STEP.to_string(),
            details: "pipeline finished without creating an order".to_string(),
        })?;

        Ok(SubmissionReport {
            order,
            estimate: context.estimate,
            outcomes,
        })
    }
}
