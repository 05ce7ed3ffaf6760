pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::PortalConfig;

pub use adapters::{DraftStore, LocalStorage, StaticSession, SupabaseAuth, SupabaseClient};
pub use app::{
    admin::AdminDashboard, client_portal::ClientPortal, ordering::OrderService,
    payment::PaymentService,
};
pub use crate::core::{pricing::PriceCalculator, submission::SubmissionPipeline, wizard::Wizard};
pub use utils::error::{PortalError, Result};
