use crate::app::payment::{PaymentAction, PaymentService};
use crate::config::toml_config::PortalConfig;
use crate::core::order_steps::{order_wizard, OrderStepValidator};
use crate::core::pricing::PriceCalculator;
use crate::core::submission::{
    CreateOrderStep, DispatchNotificationStep, SubmissionAdapter, SubmissionContext,
    SubmissionPipeline, SubmissionReport, UserNotificationStep,
};
use crate::domain::catalog::ServiceCatalog;
use crate::core::wizard::Transition;
use crate::domain::model::{OrderFormState, PaymentMethod, PriceEstimate};
use crate::domain::ports::{FunctionInvoker, SessionProvider, TableStore};
use crate::utils::error::{PortalError, Result};
use std::sync::Arc;

/// 送出後的結果；表單沒有選付款方式時 `payment` 為 `None`
#[derive(Debug)]
pub struct PlacedOrder {
    pub report: SubmissionReport,
    pub payment: Option<PaymentAction>,
}

/// 下單流程入口：試算、驗證、送出
pub struct OrderService {
    catalog: Arc<ServiceCatalog>,
    calculator: PriceCalculator,
    validator: OrderStepValidator,
    adapter: SubmissionAdapter,
    pipeline: SubmissionPipeline,
    session: Arc<dyn SessionProvider>,
}

impl OrderService {
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        pipeline: SubmissionPipeline,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let calculator = PriceCalculator::new(catalog.unknown_key_policy);
        Self {
            validator: OrderStepValidator::new(catalog.clone()),
            adapter: SubmissionAdapter::new(calculator),
            calculator,
            catalog,
            pipeline,
            session,
        }
    }

    /// 依設定組出送出步驟（通知可在設定中關閉）
    pub fn from_config(
        config: &PortalConfig,
        store: Arc<dyn TableStore>,
        functions: Arc<dyn FunctionInvoker>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let mut pipeline = SubmissionPipeline::new();
        pipeline.add_step(Box::new(CreateOrderStep::new(
            store.clone(),
            config.tables.orders.as_str(),
        )));
        if config.notifications.dispatch_enabled {
            pipeline.add_step(Box::new(DispatchNotificationStep::new(
                functions,
                config.functions.send_notification.as_str(),
            )));
        }
        if config.notifications.user_notifications {
            pipeline.add_step(Box::new(UserNotificationStep::new(
                store,
                config.tables.notifications.as_str(),
            )));
        }
        Self::new(Arc::new(config.catalog()), pipeline, session)
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn validator(&self) -> &OrderStepValidator {
        &self.validator
    }

    pub fn quote(&self, form: &OrderFormState) -> Result<PriceEstimate> {
        let service_id = form
            .service_id
            .as_deref()
            .ok_or_else(|| PortalError::validation("choose a service first"))?;
        let service = self.catalog.get(service_id)?;
        self.calculator.estimate(service, form)
    }

    pub async fn submit(&self, form: &OrderFormState) -> Result<SubmissionReport> {
        self.validator.check_all(form)?;

        let service_id = form.service_id.as_deref().unwrap_or_default();
        let service = self.catalog.get(service_id)?;

        let user = self.session.current_user().await;
        let (record, estimate) =
            self.adapter
                .build_record(service, form, user.as_ref().map(|u| u.id.as_str()))?;

        tracing::info!(
            "🚀 Submitting {} order for {} (total {})",
            service.id,
            record.email,
            estimate.total
        );

        let report = self
            .pipeline
            .run(SubmissionContext::new(record, estimate, user))
            .await
            .map_err(PortalError::order_failed)?;

        if report.has_failures() {
            tracing::warn!(
                "⚠️ Order {} created but some follow-up steps failed",
                report.order.id
            );
        }
        Ok(report)
    }

    /// 依序走過每個下單步驟，停住時回傳該步驟的檢查錯誤
    pub async fn walk_steps(&self, form: OrderFormState) -> Result<OrderFormState> {
        let wizard = order_wizard(self.catalog.clone(), form)?;
        loop {
            match wizard.next().await {
                Transition::Moved { from, .. } => {
                    tracing::debug!("Order step {} passed", wizard.steps()[from]);
                }
                Transition::Completed(form) => return Ok(form),
                Transition::Stayed | Transition::AtBoundary | Transition::Busy => {
                    let snapshot = wizard.snapshot();
                    return Err(self
                        .validator
                        .check_step(&snapshot.current_step, &snapshot.data)
                        .err()
                        .unwrap_or_else(|| {
                            PortalError::validation(format!(
                                "step '{}' did not pass",
                                snapshot.current_step
                            ))
                        }));
                }
            }
        }
    }

    /// 草稿 → 步驟檢查 → 送出 → 付款。
    ///
    /// 卡片 token 不會存進草稿，`payment` 有值時會取代表單上的付款方式。
    pub async fn place_order(
        &self,
        mut form: OrderFormState,
        payment: Option<PaymentMethod>,
        payments: &PaymentService,
    ) -> Result<PlacedOrder> {
        if let Some(method) = payment {
            form.select_payment(method);
        }

        let form = self.walk_steps(form).await?;
        let report = self.submit(&form).await?;

        let payment = match &form.payment_method {
            Some(method) => Some(payments.begin(&report.order, method).await?),
            None => None,
        };
        Ok(PlacedOrder { report, payment })
    }
}
