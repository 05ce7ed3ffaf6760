use crate::domain::catalog::ServiceConfig;
use crate::domain::model::{ContactInfo, OrderFormState, PaymentMethod};
use crate::utils::error::{PortalError, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "copypro")]
#[command(about = "CopyPro Cloud order estimation and portal tools")]
pub struct CliConfig {
    #[arg(long, default_value = "portal.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[arg(long, env = "COPYPRO_EMAIL", help = "Sign in with this e-mail")]
    pub email: Option<String>,

    #[arg(long, env = "COPYPRO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List configured services and their prices
    Services,
    /// Compute a price estimate
    Quote(SelectionArgs),
    /// Save or inspect local order drafts
    #[command(subcommand)]
    Draft(DraftCommand),
    /// Validate a draft through the order steps and submit it
    Order {
        #[arg(long)]
        draft: String,
        #[arg(long)]
        keep_draft: bool,
        /// Overrides the draft's payment method; card tokens are never stored in drafts
        #[arg(long, help = "checkout, invoice or card:<token>")]
        payment: Option<String>,
    },
    /// List orders (admin, or only your own with --mine)
    Orders {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long)]
        mine: bool,
    },
    /// List support tickets
    Tickets {
        #[arg(long)]
        status: Option<String>,
    },
    /// Order analytics
    Analytics {
        #[arg(long, default_value = "1000")]
        limit: usize,
    },
    /// Show diagnostics and the processing queue
    Diagnostics {
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long, help = "Run the remote diagnostics function first")]
        run: bool,
    },
    /// Trigger the remote reprocessing of stuck orders
    Reprocess,
    /// Export orders to CSV
    Export {
        #[arg(long)]
        output: String,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum DraftCommand {
    Save {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long = "answer", value_name = "KEY=VALUE")]
        answers: Vec<String>,
        #[arg(long)]
        contact_name: Option<String>,
        #[arg(long)]
        contact_email: Option<String>,
        #[arg(long)]
        contact_phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long, help = "checkout, invoice or card:<token>")]
        payment: Option<String>,
    },
    Show {
        #[arg(long)]
        name: String,
    },
    Discard {
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    #[arg(long)]
    pub service: String,
    #[arg(long)]
    pub tier: Option<String>,
    #[arg(long)]
    pub words: Option<u32>,
    #[arg(long = "add-on")]
    pub add_ons: Vec<String>,
    #[arg(long)]
    pub delivery: Option<String>,
}

impl SelectionArgs {
    pub fn to_form(&self) -> OrderFormState {
        let mut form = OrderFormState::for_service(self.service.clone());
        if let Some(tier) = &self.tier {
            form.select_length_tier(tier.clone());
        }
        if let Some(words) = self.words {
            form.set_word_count(words);
        }
        for add_on in &self.add_ons {
            form.add_ons.insert(add_on.clone());
        }
        if let Some(delivery) = &self.delivery {
            form.select_delivery(delivery.clone());
        }
        form
    }
}

pub fn parse_payment(raw: &str) -> Result<PaymentMethod> {
    match raw.split_once(':') {
        Some(("card", token)) => Ok(PaymentMethod::Card {
            token: token.to_string(),
        }),
        None if raw == "checkout" => Ok(PaymentMethod::Checkout),
        None if raw == "invoice" => Ok(PaymentMethod::Invoice),
        _ => Err(PortalError::validation(format!(
            "unknown payment method '{}' (use checkout, invoice or card:<token>)",
            raw
        ))),
    }
}

/// `key=value` 依欄位型別解析後寫入表單
pub fn apply_answers(service: &ServiceConfig, form: &mut OrderFormState, answers: &[String]) -> Result<()> {
    for raw in answers {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            PortalError::validation(format!("answer '{}' must look like key=value", raw))
        })?;
        let field = service.field(key.trim()).ok_or_else(|| {
            PortalError::validation(format!("'{}' is not a field of '{}'", key, service.name))
        })?;
        form.set_answer(field.key.clone(), field.parse_answer(value)?);
    }
    Ok(())
}

pub fn contact_from_args(
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
) -> ContactInfo {
    ContactInfo {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        phone,
        company,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{FieldKind, FieldSpec};
    use crate::domain::model::FieldAnswer;

    #[test]
    fn test_parse_quote_command() {
        let cli = CliConfig::parse_from([
            "copypro",
            "quote",
            "--service",
            "article",
            "--tier",
            "2000-3000",
            "--add-on",
            "images",
            "--add-on",
            "infographics",
            "--delivery",
            "urgent",
        ]);
        let Command::Quote(selection) = cli.command else {
            panic!("expected quote command");
        };
        let form = selection.to_form();
        assert_eq!(form.length_tier.as_deref(), Some("2000-3000"));
        assert_eq!(form.add_ons.len(), 2);
    }

    #[test]
    fn test_parse_payment() {
        assert_eq!(parse_payment("invoice").unwrap(), PaymentMethod::Invoice);
        assert_eq!(
            parse_payment("card:tok_1").unwrap(),
            PaymentMethod::Card {
                token: "tok_1".to_string()
            }
        );
        assert!(parse_payment("cash").is_err());
    }

    #[test]
    fn test_apply_answers() {
        let service = ServiceConfig {
            id: "landing".to_string(),
            name: "Landing page".to_string(),
            description: None,
            base_price: Some(3000),
            length_tiers: vec![],
            add_ons: vec![],
            delivery_tiers: vec![],
            fields: vec![FieldSpec {
                key: "sections".to_string(),
                label: "Sections".to_string(),
                required: true,
                kind: FieldKind::Range {
                    min: 1,
                    max: 12,
                    step: 1,
                },
            }],
        };
        let mut form = OrderFormState::for_service("landing");
        apply_answers(&service, &mut form, &["sections=6".to_string()]).unwrap();
        assert_eq!(form.answers.get("sections"), Some(&FieldAnswer::Number(6)));

        assert!(apply_answers(&service, &mut form, &["sections=60".to_string()]).is_err());
        assert!(apply_answers(&service, &mut form, &["colour=red".to_string()]).is_err());
    }

    #[test]
    fn test_order_command_takes_payment_override() {
        let cli = CliConfig::parse_from([
            "copypro",
            "order",
            "--draft",
            "spring",
            "--payment",
            "card:tok_visa",
        ]);
        let Command::Order { draft, payment, .. } = cli.command else {
            panic!("expected order command");
        };
        assert_eq!(draft, "spring");
        assert_eq!(
            parse_payment(payment.as_deref().unwrap()).unwrap(),
            PaymentMethod::Card {
                token: "tok_visa".to_string()
            }
        );
    }
}
