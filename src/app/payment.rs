use crate::config::toml_config::FunctionNames;
use crate::domain::model::{OrderRecord, PaymentMethod};
use crate::domain::ports::FunctionInvoker;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::validate_url;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAction {
    /// 導向金流商的付款頁
    Redirect(Url),
    AwaitInvoice,
    Charged { reference: String },
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    reference: Option<String>,
    id: Option<String>,
}

pub struct PaymentService {
    functions: Arc<dyn FunctionInvoker>,
    function_names: FunctionNames,
    return_url: Option<String>,
}

impl PaymentService {
    pub fn new(functions: Arc<dyn FunctionInvoker>, function_names: FunctionNames) -> Self {
        Self {
            functions,
            function_names,
            return_url: None,
        }
    }

    pub fn with_return_url(mut self, return_url: impl Into<String>) -> Self {
        self.return_url = Some(return_url.into());
        self
    }

    pub async fn begin(&self, order: &OrderRecord, method: &PaymentMethod) -> Result<PaymentAction> {
        match method {
            PaymentMethod::Invoice => {
                tracing::info!("🧾 Order {} will be paid by invoice", order.id);
                Ok(PaymentAction::AwaitInvoice)
            }
            PaymentMethod::Checkout => {
                let body = json!({
                    "order_id": order.id,
                    "amount": order.price,
                    "email": order.email,
                    "description": format!("{} order", order.service_type),
                    "return_url": self.return_url,
                });
                let response = self
                    .functions
                    .invoke(&self.function_names.create_payment_session, body)
                    .await?;
                let session: SessionResponse = serde_json::from_value(response)?;
                let url = session.url.ok_or_else(|| PortalError::BackendError {
                    status: 200,
                    code: None,
                    message: "payment session response has no url".to_string(),
                })?;
                validate_url("payment.url", &url)?;
                let url = Url::parse(&url).map_err(|e| PortalError::validation(e.to_string()))?;
                tracing::info!("💳 Checkout session created for order {}", order.id);
                Ok(PaymentAction::Redirect(url))
            }
            PaymentMethod::Card { token } => {
                if token.trim().is_empty() {
                    return Err(PortalError::validation(
                        "card payments need a token from the payment provider",
                    ));
                }
                let body = json!({
                    "order_id": order.id,
                    "amount": order.price,
                    "payment_token": token,
                });
                let response = self
                    .functions
                    .invoke(&self.function_names.charge_card, body)
                    .await?;
                let charge: ChargeResponse = serde_json::from_value(response)?;
                let reference = charge
                    .reference
                    .or(charge.id)
                    .unwrap_or_else(|| order.id.clone());
                Ok(PaymentAction::Charged { reference })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedFunctions {
        response: serde_json::Value,
        calls: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl FunctionInvoker for CannedFunctions {
        async fn invoke(&self, name: &str, body: serde_json::Value) -> Result<serde_json::Value> {
            self.calls.lock().unwrap().push((name.to_string(), body));
            Ok(self.response.clone())
        }
    }

    fn order() -> OrderRecord {
        serde_json::from_value(json!({
            "id": "ord-1",
            "service_type": "article",
            "name": "Anna",
            "email": "anna@example.com",
            "price": 9450,
            "status": "pending"
        }))
        .unwrap()
    }

    fn service(response: serde_json::Value) -> (PaymentService, Arc<CannedFunctions>) {
        let functions = Arc::new(CannedFunctions {
            response,
            calls: Mutex::new(vec![]),
        });
        (
            PaymentService::new(functions.clone(), FunctionNames::default()),
            functions,
        )
    }

    #[tokio::test]
    async fn test_checkout_returns_redirect() {
        let (payments, functions) = service(json!({"url": "https://pay.example.com/s/123"}));
        let action = payments.begin(&order(), &PaymentMethod::Checkout).await.unwrap();

        assert_eq!(
            action,
            PaymentAction::Redirect(Url::parse("https://pay.example.com/s/123").unwrap())
        );
        let calls = functions.calls.lock().unwrap();
        assert_eq!(calls[0].0, "create-payment-session");
        assert_eq!(calls[0].1["amount"], json!(9450));
    }

    #[tokio::test]
    async fn test_checkout_without_url_is_error() {
        let (payments, _) = service(json!({"error": null}));
        assert!(payments.begin(&order(), &PaymentMethod::Checkout).await.is_err());
    }

    #[tokio::test]
    async fn test_invoice_makes_no_remote_call() {
        let (payments, functions) = service(json!({}));
        let action = payments.begin(&order(), &PaymentMethod::Invoice).await.unwrap();
        assert_eq!(action, PaymentAction::AwaitInvoice);
        assert!(functions.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_card_charge_uses_token() {
        let (payments, functions) = service(json!({"reference": "ch_42"}));
        let action = payments
            .begin(
                &order(),
                &PaymentMethod::Card {
                    token: "tok_visa".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            action,
            PaymentAction::Charged {
                reference: "ch_42".to_string()
            }
        );
        assert_eq!(
            functions.calls.lock().unwrap()[0].1["payment_token"],
            json!("tok_visa")
        );
    }
}
