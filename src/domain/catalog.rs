//! 服務目錄：每個服務的欄位、基本價格、加購項目與交期倍率。
//!
//! 目錄從 TOML 載入後即為唯讀，執行期間不會被修改。

use crate::domain::model::FieldAnswer;
use crate::utils::error::{PortalError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_unique_keys, Validate,
};
use serde::{Deserialize, Serialize};

/// 倍率以萬分比（basis points）保存，1.5 => 15_000
pub const MULTIPLIER_SCALE: u64 = 10_000;
/// 交期倍率上限
pub const MAX_DELIVERY_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeyPolicy {
    /// 未知的 tier / add-on / delivery key 視為輸入錯誤
    #[default]
    Reject,
    /// 忽略未知的 key，只記錄警告
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// 沒有字數級距時使用的固定價格
    pub base_price: Option<u64>,
    #[serde(default)]
    pub length_tiers: Vec<LengthTier>,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    #[serde(default)]
    pub delivery_tiers: Vec<DeliveryTier>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthTier {
    pub key: String,
    pub label: Option<String>,
    pub min_words: Option<u32>,
    pub max_words: Option<u32>,
    pub price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOn {
    pub key: String,
    pub label: String,
    pub price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryTier {
    pub key: String,
    pub label: String,
    pub multiplier: f64,
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default)]
        multiline: bool,
        max_length: Option<usize>,
    },
    Select {
        options: Vec<String>,
    },
    MultiSelect {
        options: Vec<String>,
    },
    Range {
        min: i64,
        max: i64,
        #[serde(default = "default_step")]
        step: i64,
    },
    Checkbox,
}

fn default_step() -> i64 {
    1
}

impl LengthTier {
    pub fn contains_words(&self, words: u32) -> bool {
        let above_min = self.min_words.map_or(true, |min| words >= min);
        let below_max = self.max_words.map_or(true, |max| words < max);
        above_min && below_max
    }
}

impl DeliveryTier {
    pub fn multiplier_bps(&self) -> u64 {
        (self.multiplier * MULTIPLIER_SCALE as f64).round() as u64
    }
}

impl ServiceConfig {
    pub fn length_tier(&self, key: &str) -> Option<&LengthTier> {
        self.length_tiers.iter().find(|t| t.key == key)
    }

    /// 依字數找出對應的級距（第一個符合的）
    pub fn tier_for_words(&self, words: u32) -> Option<&LengthTier> {
        self.length_tiers.iter().find(|t| t.contains_words(words))
    }

    pub fn add_on(&self, key: &str) -> Option<&AddOn> {
        self.add_ons.iter().find(|a| a.key == key)
    }

    pub fn delivery_tier(&self, key: &str) -> Option<&DeliveryTier> {
        self.delivery_tiers.iter().find(|d| d.key == key)
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("services.id", &self.id)?;
        validate_non_empty_string(&format!("services.{}.name", self.id), &self.name)?;

        if self.base_price.is_none() && self.length_tiers.is_empty() {
            return Err(PortalError::ConfigValidationError {
                field: format!("services.{}", self.id),
                message: "either base_price or length_tiers must be configured".to_string(),
            });
        }

        validate_unique_keys(
            &format!("services.{}.length_tiers", self.id),
            self.length_tiers.iter().map(|t| t.key.as_str()),
        )?;
        validate_unique_keys(
            &format!("services.{}.add_ons", self.id),
            self.add_ons.iter().map(|a| a.key.as_str()),
        )?;
        validate_unique_keys(
            &format!("services.{}.delivery_tiers", self.id),
            self.delivery_tiers.iter().map(|d| d.key.as_str()),
        )?;
        validate_unique_keys(
            &format!("services.{}.fields", self.id),
            self.fields.iter().map(|f| f.key.as_str()),
        )?;

        for tier in &self.length_tiers {
            if let (Some(min), Some(max)) = (tier.min_words, tier.max_words) {
                if min >= max {
                    return Err(PortalError::InvalidConfigValueError {
                        field: format!("services.{}.length_tiers.{}", self.id, tier.key),
                        value: format!("{}-{}", min, max),
                        reason: "min_words must be below max_words".to_string(),
                    });
                }
            }
        }

        for tier in &self.delivery_tiers {
            let field = format!("services.{}.delivery_tiers.{}", self.id, tier.key);
            if !tier.multiplier.is_finite() {
                return Err(PortalError::InvalidConfigValueError {
                    field,
                    value: tier.multiplier.to_string(),
                    reason: "multiplier must be a finite number".to_string(),
                });
            }
            validate_range(&field, tier.multiplier, 1.0, MAX_DELIVERY_MULTIPLIER)?;
        }

        for field in &self.fields {
            field.validate()?;
        }

        Ok(())
    }
}

impl Validate for FieldSpec {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("fields.key", &self.key)?;
        match &self.kind {
            FieldKind::Select { options } | FieldKind::MultiSelect { options } => {
                if options.is_empty() {
                    return Err(PortalError::ConfigValidationError {
                        field: format!("fields.{}", self.key),
                        message: "select fields need at least one option".to_string(),
                    });
                }
                validate_unique_keys(
                    &format!("fields.{}.options", self.key),
                    options.iter().map(String::as_str),
                )
            }
            FieldKind::Range { min, max, step } => {
                if min > max || *step <= 0 {
                    return Err(PortalError::ConfigValidationError {
                        field: format!("fields.{}", self.key),
                        message: format!("invalid range {}..={} step {}", min, max, step),
                    });
                }
                Ok(())
            }
            FieldKind::Text { .. } | FieldKind::Checkbox => Ok(()),
        }
    }
}

impl FieldSpec {
    /// 檢查答案是否符合欄位型別與限制
    pub fn check_answer(&self, answer: Option<&FieldAnswer>) -> Result<()> {
        let answer = match answer {
            Some(answer) if !answer.is_blank() => answer,
            _ if self.required => {
                return Err(PortalError::validation(format!(
                    "'{}' is required",
                    self.label
                )))
            }
            _ => return Ok(()),
        };

        match (&self.kind, answer) {
            (FieldKind::Text { max_length, .. }, FieldAnswer::Text(text)) => {
                if let Some(max) = max_length {
                    if text.chars().count() > *max {
                        return Err(PortalError::validation(format!(
                            "'{}' must be at most {} characters",
                            self.label, max
                        )));
                    }
                }
                Ok(())
            }
            (FieldKind::Select { options }, FieldAnswer::Choice(choice)) => {
                if !options.contains(choice) {
                    return Err(PortalError::validation(format!(
                        "'{}' is not an option of '{}'",
                        choice, self.label
                    )));
                }
                Ok(())
            }
            (FieldKind::MultiSelect { options }, FieldAnswer::Choices(choices)) => {
                if let Some(bad) = choices.iter().find(|c| !options.contains(c)) {
                    return Err(PortalError::validation(format!(
                        "'{}' is not an option of '{}'",
                        bad, self.label
                    )));
                }
                Ok(())
            }
            (FieldKind::Range { min, max, step }, FieldAnswer::Number(n)) => {
                if n < min || n > max || (n - min) % step != 0 {
                    return Err(PortalError::validation(format!(
                        "'{}' must be between {} and {} in steps of {}",
                        self.label, min, max, step
                    )));
                }
                Ok(())
            }
            (FieldKind::Checkbox, FieldAnswer::Flag(_)) => Ok(()),
            (kind, answer) => Err(PortalError::validation(format!(
                "'{}' expects {} but got {}",
                self.label,
                kind.name(),
                answer.kind_name()
            ))),
        }
    }

    /// 從文字輸入建立答案（CLI 的 `key=value`）
    pub fn parse_answer(&self, raw: &str) -> Result<FieldAnswer> {
        let raw = raw.trim();
        let answer = match &self.kind {
            FieldKind::Text { .. } => FieldAnswer::Text(raw.to_string()),
            FieldKind::Select { .. } => FieldAnswer::Choice(raw.to_string()),
            FieldKind::MultiSelect { .. } => FieldAnswer::Choices(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            FieldKind::Range { .. } => FieldAnswer::Number(raw.parse().map_err(|_| {
                PortalError::validation(format!("'{}' expects a whole number", self.label))
            })?),
            FieldKind::Checkbox => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => FieldAnswer::Flag(true),
                "false" | "no" | "0" | "off" => FieldAnswer::Flag(false),
                _ => {
                    return Err(PortalError::validation(format!(
                        "'{}' expects yes or no",
                        self.label
                    )))
                }
            },
        };
        self.check_answer(Some(&answer))?;
        Ok(answer)
    }

    /// 把答案轉成 details 文字區塊中的一行
    pub fn render_answer(&self, answer: &FieldAnswer) -> String {
        let value = match (&self.kind, answer) {
            (FieldKind::Text { multiline: true, .. }, FieldAnswer::Text(text)) => {
                format!("\n{}", text.trim_end())
            }
            (FieldKind::Text { .. }, FieldAnswer::Text(text)) => text.trim().to_string(),
            (FieldKind::Select { .. }, FieldAnswer::Choice(choice)) => choice.clone(),
            (FieldKind::MultiSelect { .. }, FieldAnswer::Choices(choices)) => choices
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            (FieldKind::Range { .. }, FieldAnswer::Number(n)) => n.to_string(),
            (FieldKind::Checkbox, FieldAnswer::Flag(flag)) => {
                let value = if *flag { "yes" } else { "no" };
                value.to_string()
            }
            (_, other) => other.to_string(),
        };
        format!("{}: {}", self.label, value)
    }
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Select { .. } => "select",
            FieldKind::MultiSelect { .. } => "multiselect",
            FieldKind::Range { .. } => "range",
            FieldKind::Checkbox => "checkbox",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceCatalog {
    #[serde(default)]
    pub unknown_key_policy: UnknownKeyPolicy,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceConfig>, unknown_key_policy: UnknownKeyPolicy) -> Self {
        Self {
            unknown_key_policy,
            services,
        }
    }

    pub fn get(&self, service_id: &str) -> Result<&ServiceConfig> {
        self.services
            .iter()
            .find(|s| s.id == service_id)
            .ok_or_else(|| PortalError::UnknownServiceError {
                service: service_id.to_string(),
            })
    }
}

impl Validate for ServiceCatalog {
    fn validate(&self) -> Result<()> {
        validate_unique_keys("services", self.services.iter().map(|s| s.id.as_str()))?;
        for service in &self.services {
            service.validate()?;
        }
        Ok(())
    }
}
