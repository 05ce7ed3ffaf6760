use crate::domain::catalog::{ServiceCatalog, ServiceConfig, UnknownKeyPolicy};
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_required_field, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub tables: TableNames,
    #[serde(default)]
    pub functions: FunctionNames,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    pub drafts: Option<DraftConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub orders: String,
    pub tickets: String,
    pub seo_templates: String,
    pub autolinks: String,
    pub settings: String,
    pub diagnostics: String,
    pub order_queue: String,
    pub notifications: String,
    pub profiles: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            orders: "orders".to_string(),
            tickets: "tickets".to_string(),
            seo_templates: "seo_templates".to_string(),
            autolinks: "autolinks".to_string(),
            settings: "settings".to_string(),
            diagnostics: "system_diagnostics".to_string(),
            order_queue: "order_queue".to_string(),
            notifications: "notifications".to_string(),
            profiles: "profiles".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionNames {
    pub send_notification: String,
    pub create_payment_session: String,
    pub charge_card: String,
    pub process_order: String,
    pub reprocess_stuck_orders: String,
    pub system_diagnostics: String,
}

impl Default for FunctionNames {
    fn default() -> Self {
        Self {
            send_notification: "send-notification".to_string(),
            create_payment_session: "create-payment-session".to_string(),
            charge_card: "charge-card".to_string(),
            process_order: "process-order".to_string(),
            reprocess_stuck_orders: "reprocess-stuck-orders".to_string(),
            system_diagnostics: "system-diagnostics".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub dispatch_enabled: bool,
    pub user_notifications: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dispatch_enabled: true,
            user_notifications: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub unknown_key_policy: UnknownKeyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    pub directory: String,
}

impl PortalConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SUPABASE_ANON_KEY})，找不到的保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| PortalError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("backend.url", &self.backend.url)?;

        let anon_key = validate_required_field("backend.anon_key", &self.backend.anon_key)?;
        validate_non_empty_string("backend.anon_key", anon_key)?;
        if anon_key.starts_with("${") {
            return Err(PortalError::MissingConfigError {
                field: format!("backend.anon_key (environment variable {} is not set)", anon_key),
            });
        }

        if let Some(drafts) = &self.drafts {
            validate_path("drafts.directory", &drafts.directory)?;
        }

        self.catalog().validate()
    }

    pub fn anon_key(&self) -> &str {
        self.backend.anon_key.as_deref().unwrap_or_default()
    }

    pub fn catalog(&self) -> ServiceCatalog {
        ServiceCatalog::new(self.services.clone(), self.pricing.unknown_key_policy)
    }

    pub fn drafts_dir(&self) -> &str {
        self.drafts
            .as_ref()
            .map(|d| d.directory.as_str())
            .unwrap_or("./drafts")
    }
}

impl Validate for PortalConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::FieldKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[backend]
url = "https://abc.supabase.co"
anon_key = "public-anon-key"

[pricing]
unknown_key_policy = "ignore"

[[services]]
id = "article"
name = "SEO article"

[[services.length_tiers]]
key = "1000-2000"
min_words = 1000
max_words = 2000
price = 2500

[[services.add_ons]]
key = "images"
label = "Images"
price = 800

[[services.delivery_tiers]]
key = "urgent"
label = "Urgent"
multiplier = 1.5
days = 1

[[services.fields]]
key = "tone"
label = "Tone of voice"
type = "select"
options = ["formal", "friendly"]
"#;

    #[test]
    fn test_parse_portal_config() {
        let config = PortalConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.backend.url, "https://abc.supabase.co");
        assert_eq!(config.tables.orders, "orders");
        assert_eq!(config.functions.send_notification, "send-notification");
        assert!(config.notifications.dispatch_enabled);
        assert_eq!(config.pricing.unknown_key_policy, UnknownKeyPolicy::Ignore);

        let catalog = config.catalog();
        let article = catalog.get("article").unwrap();
        assert_eq!(article.length_tiers[0].price, 2500);
        assert!(matches!(article.fields[0].kind, FieldKind::Select { .. }));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COPYPRO_TEST_ANON_KEY", "key-from-env");

        let toml_content = r#"
[backend]
url = "https://abc.supabase.co"
anon_key = "${COPYPRO_TEST_ANON_KEY}"
"#;

        let config = PortalConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.anon_key(), "key-from-env");

        std::env::remove_var("COPYPRO_TEST_ANON_KEY");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let toml_content = r#"
[backend]
url = "https://abc.supabase.co"
anon_key = "${COPYPRO_SURELY_UNSET_VARIABLE}"
"#;

        let config = PortalConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(PortalError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_invalid_backend_url() {
        let toml_content = r#"
[backend]
url = "invalid-url"
anon_key = "k"
"#;

        let config = PortalConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = PortalConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.drafts_dir(), "./drafts");
    }

    #[test]
    fn test_bundled_example_config_parses() {
        let config =
            PortalConfig::from_toml_str(include_str!("../../portal.example.toml")).unwrap();
        assert_eq!(config.services.len(), 2);
        assert!(config.catalog().validate().is_ok());

        let landing = config.catalog().get("landing").unwrap().clone();
        assert!(matches!(
            landing.field("channels").unwrap().kind,
            FieldKind::MultiSelect { .. }
        ));
    }

    #[test]
    fn test_malformed_toml_is_toml_error() {
        let result = PortalConfig::from_toml_str("[backend\nurl = ");
        let err = result.unwrap_err();
        assert!(matches!(err, PortalError::TomlError(_)));
        assert_eq!(err.severity(), crate::utils::error::ErrorSeverity::Critical);
    }
}
