use crate::core::pricing::PriceCalculator;
use crate::core::wizard::{StepValidator, Wizard};
use crate::domain::catalog::ServiceCatalog;
use crate::domain::model::{OrderFormState, PaymentMethod};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::validate_email;
use async_trait::async_trait;
use std::sync::Arc;

pub const STEP_SERVICE: &str = "service";
pub const STEP_DETAILS: &str = "details";
pub const STEP_OPTIONS: &str = "options";
pub const STEP_CONTACT: &str = "contact";
pub const STEP_PAYMENT: &str = "payment";

pub const ORDER_STEPS: [&str; 5] = [
    STEP_SERVICE,
    STEP_DETAILS,
    STEP_OPTIONS,
    STEP_CONTACT,
    STEP_PAYMENT,
];

pub type OrderWizard = Wizard<OrderFormState, OrderStepValidator>;

pub fn order_wizard(catalog: Arc<ServiceCatalog>, form: OrderFormState) -> Result<OrderWizard> {
    Wizard::new(ORDER_STEPS, form, OrderStepValidator::new(catalog))
}

/// 依步驟檢查表單中對應的部分
#[derive(Debug, Clone)]
pub struct OrderStepValidator {
    catalog: Arc<ServiceCatalog>,
    calculator: PriceCalculator,
}

impl OrderStepValidator {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        let calculator = PriceCalculator::new(catalog.unknown_key_policy);
        Self {
            catalog,
            calculator,
        }
    }

    pub fn check_step(&self, step: &str, form: &OrderFormState) -> Result<()> {
        match step {
            STEP_SERVICE => self.check_service(form).map(|_| ()),
            STEP_DETAILS => self.check_details(form),
            STEP_OPTIONS => {
                let service = self.check_service(form)?;
                self.calculator.estimate(service, form).map(|_| ())
            }
            STEP_CONTACT => check_contact(form),
            STEP_PAYMENT => check_payment(form),
            other => Err(PortalError::validation(format!("unknown step '{}'", other))),
        }
    }

    /// 送出前一次檢查所有步驟
    pub fn check_all(&self, form: &OrderFormState) -> Result<()> {
        for step in ORDER_STEPS {
            self.check_step(step, form)?;
        }
        Ok(())
    }

    fn check_service(&self, form: &OrderFormState) -> Result<&crate::domain::catalog::ServiceConfig> {
        let service_id = form
            .service_id
            .as_deref()
            .ok_or_else(|| PortalError::validation("choose a service first"))?;
        self.catalog.get(service_id)
    }

    fn check_details(&self, form: &OrderFormState) -> Result<()> {
        let service = self.check_service(form)?;
        for field in &service.fields {
            field.check_answer(form.answers.get(&field.key))?;
        }
        if let Some(extra) = form.answers.keys().find(|k| service.field(k).is_none()) {
            return Err(PortalError::validation(format!(
                "'{}' is not a field of '{}'",
                extra, service.name
            )));
        }
        Ok(())
    }
}

fn check_contact(form: &OrderFormState) -> Result<()> {
    if form.contact.name.trim().is_empty() {
        return Err(PortalError::validation("contact name is required"));
    }
    validate_email("contact.email", &form.contact.email)
}

fn check_payment(form: &OrderFormState) -> Result<()> {
    match &form.payment_method {
        None => Err(PortalError::validation("choose a payment method")),
        Some(PaymentMethod::Card { token }) if token.trim().is_empty() => Err(
            PortalError::validation("card payments need a token from the payment provider"),
        ),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl StepValidator<OrderFormState> for OrderStepValidator {
    async fn validate(&self, step: &str, _index: usize, data: &OrderFormState) -> Result<bool> {
        self.check_step(step, data)?;
        Ok(true)
    }
}
