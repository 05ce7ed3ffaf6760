use clap::Parser;
use copypro_portal::app::admin::{export_orders_csv, OrderFilter};
use copypro_portal::app::payment::PaymentAction;
use copypro_portal::config::cli::{
    apply_answers, contact_from_args, parse_payment, Command, DraftCommand,
};
use copypro_portal::domain::model::{OrderFormState, OrderStatus, PaymentMethod, TicketStatus};
use copypro_portal::domain::ports::SessionProvider;
use copypro_portal::utils::error::ErrorSeverity;
use copypro_portal::utils::{logger, validation::Validate};
use copypro_portal::{
    AdminDashboard, ClientPortal, CliConfig, DraftStore, LocalStorage, OrderService,
    PaymentService, PortalConfig, PortalError, PriceCalculator, Result, StaticSession,
    SupabaseAuth, SupabaseClient,
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting copypro CLI");
    if cli.verbose {
        tracing::debug!("CLI command: {:?}", cli.command);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

struct Backend {
    client: Arc<SupabaseClient>,
    session: Arc<dyn SessionProvider>,
}

impl Backend {
    async fn connect(config: &PortalConfig, cli: &CliConfig) -> Result<Self> {
        let session: Arc<dyn SessionProvider> = match (&cli.email, &cli.password) {
            (Some(email), Some(password)) => {
                let auth = SupabaseAuth::new(&config.backend.url, config.anon_key())?;
                auth.login(email, password).await?;
                Arc::new(auth)
            }
            _ => Arc::new(StaticSession::anonymous()),
        };

        let client = SupabaseClient::new(&config.backend.url, config.anon_key())?
            .with_schema(config.backend.schema.clone())
            .with_session(session.clone());

        Ok(Self {
            client: Arc::new(client),
            session,
        })
    }

    fn admin(&self, config: &PortalConfig) -> AdminDashboard {
        AdminDashboard::new(
            self.client.clone(),
            self.client.clone(),
            config.tables.clone(),
            config.functions.clone(),
        )
    }
}

fn parse_order_status(raw: Option<&str>) -> Result<Option<OrderStatus>> {
    raw.map(|s| s.parse::<OrderStatus>().map_err(PortalError::validation))
        .transpose()
}

fn has_missing_card_token(form: &OrderFormState) -> bool {
    matches!(&form.payment_method, Some(PaymentMethod::Card { token }) if token.is_empty())
}

fn print_estimate(calculator: &PriceCalculator, config: &PortalConfig, form: &OrderFormState) {
    let catalog = config.catalog();
    let service = match form.service_id.as_deref().map(|id| catalog.get(id)) {
        Some(Ok(service)) => service,
        _ => return,
    };
    match calculator.estimate(service, form) {
        Ok(estimate) => {
            println!("  Base price:        {}", estimate.base_price);
            println!("  Add-ons:           {}", estimate.add_ons_total);
            println!("  Urgency surcharge: {}", estimate.urgency_surcharge);
            println!("  Total:             {}", estimate.total);
        }
        Err(e) => println!("  (no estimate yet: {})", e),
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let config = PortalConfig::from_file(&cli.config)?;

    // 驗證配置
    config.validate()?;

    let catalog = config.catalog();
    let calculator = PriceCalculator::new(catalog.unknown_key_policy);
    let drafts = DraftStore::new(LocalStorage::new(config.drafts_dir().to_string()));

    match &cli.command {
        Command::Services => {
            for service in &catalog.services {
                println!("📋 {} ({})", service.name, service.id);
                if let Some(price) = service.base_price {
                    println!("  base price: {}", price);
                }
                for tier in &service.length_tiers {
                    println!("  length {}: {}", tier.key, tier.price);
                }
                for add_on in &service.add_ons {
                    println!("  + {} ({}): {}", add_on.label, add_on.key, add_on.price);
                }
                for tier in &service.delivery_tiers {
                    println!("  delivery {}: x{}", tier.key, tier.multiplier);
                }
            }
            Ok(())
        }
        Command::Quote(selection) => {
            let form = selection.to_form();
            let service = catalog.get(&selection.service)?;
            let estimate = calculator.estimate(service, &form)?;
            println!("💰 {} estimate", service.name);
            println!("  Base price:        {}", estimate.base_price);
            println!("  Add-ons:           {}", estimate.add_ons_total);
            println!("  Urgency surcharge: {}", estimate.urgency_surcharge);
            println!("  Total:             {}", estimate.total);
            Ok(())
        }
        Command::Draft(DraftCommand::Save {
            name,
            selection,
            answers,
            contact_name,
            contact_email,
            contact_phone,
            company,
            payment,
        }) => {
            let service = catalog.get(&selection.service)?;
            let mut form = selection.to_form();
            apply_answers(service, &mut form, answers)?;
            form.set_contact(contact_from_args(
                contact_name.clone(),
                contact_email.clone(),
                contact_phone.clone(),
                company.clone(),
            ));
            if let Some(payment) = payment {
                form.select_payment(parse_payment(payment)?);
            }
            let file_name = drafts.save(name, &form).await?;
            println!("💾 Draft saved to {}/{}", config.drafts_dir(), file_name);
            if matches!(form.payment_method, Some(PaymentMethod::Card { .. })) {
                println!("🔑 Card token not stored; pass --payment card:<token> to `order`");
            }
            print_estimate(&calculator, &config, &form);
            Ok(())
        }
        Command::Draft(DraftCommand::Show { name }) => {
            let form = drafts.load(name).await?;
            println!("{}", serde_json::to_string_pretty(&form)?);
            print_estimate(&calculator, &config, &form);
            Ok(())
        }
        Command::Draft(DraftCommand::Discard { name }) => {
            drafts.discard(name).await?;
            println!("🗑️ Draft {} discarded", name);
            Ok(())
        }
        Command::Order {
            draft,
            keep_draft,
            payment,
        } => {
            let form = drafts.load(draft).await?;
            let payment = payment.as_deref().map(parse_payment).transpose()?;
            if payment.is_none() && has_missing_card_token(&form) {
                return Err(PortalError::validation(
                    "card tokens are not stored in drafts; pass --payment card:<token>",
                ));
            }

            let backend = Backend::connect(&config, &cli).await?;
            let orders = OrderService::from_config(
                &config,
                backend.client.clone(),
                backend.client.clone(),
                backend.session.clone(),
            );
            let payments = PaymentService::new(backend.client.clone(), config.functions.clone());
            let placed = orders.place_order(form, payment, &payments).await?;

            let report = &placed.report;
            println!("✅ Order {} created, total {}", report.order.id, report.estimate.total);
            for outcome in &report.outcomes {
                println!("  {}: {:?}", outcome.step, outcome.status);
            }

            match placed.payment {
                Some(PaymentAction::Redirect(url)) => println!("💳 Complete payment at: {}", url),
                Some(PaymentAction::AwaitInvoice) => {
                    println!("🧾 An invoice will be sent by e-mail")
                }
                Some(PaymentAction::Charged { reference }) => {
                    println!("💳 Card charged (reference {})", reference)
                }
                None => {}
            }

            if !keep_draft {
                drafts.discard(draft).await?;
            }
            Ok(())
        }
        Command::Orders {
            status,
            service,
            search,
            limit,
            mine,
        } => {
            let backend = Backend::connect(&config, &cli).await?;
            let status = parse_order_status(status.as_deref())?;
            let orders = if *mine {
                ClientPortal::new(
                    backend.client.clone(),
                    backend.session.clone(),
                    config.tables.clone(),
                )
                .my_orders(status)
                .await?
            } else {
                backend
                    .admin(&config)
                    .list_orders(&OrderFilter {
                        status,
                        service_type: service.clone(),
                        search: search.clone(),
                        limit: Some(*limit),
                    })
                    .await?
            };
            for order in &orders {
                println!(
                    "{}  {:<12} {:<10} {:>8}  {}",
                    order.id,
                    order.service_type,
                    order.status.as_str(),
                    order.price,
                    order.email
                );
            }
            println!("📊 {} orders", orders.len());
            Ok(())
        }
        Command::Tickets { status } => {
            let backend = Backend::connect(&config, &cli).await?;
            let status = status
                .as_deref()
                .map(|s| s.parse::<TicketStatus>().map_err(PortalError::validation))
                .transpose()?;
            let tickets = backend.admin(&config).list_tickets(status).await?;
            for ticket in &tickets {
                println!("{}  {:<12} {}", ticket.id, ticket.status.as_str(), ticket.subject);
            }
            println!("📊 {} tickets", tickets.len());
            Ok(())
        }
        Command::Analytics { limit } => {
            let backend = Backend::connect(&config, &cli).await?;
            let analytics = backend
                .admin(&config)
                .analytics(&OrderFilter {
                    limit: Some(*limit),
                    ..Default::default()
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
            Ok(())
        }
        Command::Diagnostics { limit, run } => {
            let backend = Backend::connect(&config, &cli).await?;
            let admin = backend.admin(&config);
            if *run {
                let result = admin.run_system_diagnostics().await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            for entry in admin.diagnostics(*limit).await? {
                println!(
                    "🩺 {:<24} {:<8} {}",
                    entry.check_name,
                    entry.status,
                    entry.message.unwrap_or_default()
                );
            }
            for entry in admin.order_queue(*limit).await? {
                println!(
                    "📦 {:<38} {:<10} attempts={} {}",
                    entry.order_id.unwrap_or_default(),
                    entry.status,
                    entry.attempts.unwrap_or(0),
                    entry.last_error.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Reprocess => {
            let backend = Backend::connect(&config, &cli).await?;
            let result = backend.admin(&config).reprocess_stuck_orders().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Export { output, status } => {
            let backend = Backend::connect(&config, &cli).await?;
            let orders = backend
                .admin(&config)
                .list_orders(&OrderFilter {
                    status: parse_order_status(status.as_deref())?,
                    ..Default::default()
                })
                .await?;
            let file = std::fs::File::create(output)?;
            let written = export_orders_csv(&orders, file)?;
            println!("📁 Exported {} orders to {}", written, output);
            Ok(())
        }
    }
}
