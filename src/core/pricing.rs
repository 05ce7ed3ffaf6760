use crate::domain::catalog::{ServiceConfig, UnknownKeyPolicy, MULTIPLIER_SCALE};
use crate::domain::model::{OrderFormState, PriceEstimate};
use crate::utils::error::{PortalError, Result};
use std::collections::BTreeSet;

/// 計價所需的選項，從表單狀態投影而來
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceSelection {
    pub length_tier: Option<String>,
    pub word_count: Option<u32>,
    pub add_ons: BTreeSet<String>,
    pub delivery_tier: Option<String>,
}

impl PriceSelection {
    pub fn from_form(form: &OrderFormState) -> Self {
        Self {
            length_tier: form.length_tier.clone(),
            word_count: form.word_count,
            add_ons: form.add_ons.clone(),
            delivery_tier: form.delivery_tier.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceCalculator {
    policy: UnknownKeyPolicy,
}

impl PriceCalculator {
    pub fn new(policy: UnknownKeyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownKeyPolicy {
        self.policy
    }

    pub fn estimate(&self, service: &ServiceConfig, form: &OrderFormState) -> Result<PriceEstimate> {
        self.quote(service, &PriceSelection::from_form(form))
    }

    /// total = base + Σ add-ons + surcharge，surcharge 以萬分比整數運算並四捨五入
    pub fn quote(&self, service: &ServiceConfig, selection: &PriceSelection) -> Result<PriceEstimate> {
        let base_price = self.base_price(service, selection)?;

        let mut add_ons_total = 0u64;
        for key in &selection.add_ons {
            match service.add_on(key) {
                Some(add_on) => add_ons_total += add_on.price,
                None => self.unknown_key(service, "add-on", key)?,
            }
        }

        let multiplier_bps = match selection.delivery_tier.as_deref() {
            Some(key) => match service.delivery_tier(key) {
                Some(tier) => tier.multiplier_bps(),
                None => {
                    self.unknown_key(service, "delivery tier", key)?;
                    MULTIPLIER_SCALE
                }
            },
            None => MULTIPLIER_SCALE,
        };

        let subtotal = base_price + add_ons_total;
        let urgency_surcharge = surcharge(subtotal, multiplier_bps);

        let estimate = PriceEstimate {
            base_price,
            add_ons_total,
            urgency_surcharge,
            total: subtotal + urgency_surcharge,
        };
        tracing::debug!("Price estimate for {}: {:?}", service.id, estimate);
        Ok(estimate)
    }

    fn base_price(&self, service: &ServiceConfig, selection: &PriceSelection) -> Result<u64> {
        if let Some(key) = selection.length_tier.as_deref() {
            match service.length_tier(key) {
                Some(tier) => return Ok(tier.price),
                None => self.unknown_key(service, "length tier", key)?,
            }
        }

        if let Some(tier) = selection.word_count.and_then(|w| service.tier_for_words(w)) {
            return Ok(tier.price);
        }

        service.base_price.ok_or_else(|| {
            PortalError::validation(format!(
                "select a content length for '{}' to get a price",
                service.name
            ))
        })
    }

    fn unknown_key(&self, service: &ServiceConfig, kind: &str, key: &str) -> Result<()> {
        match self.policy {
            UnknownKeyPolicy::Reject => Err(PortalError::UnknownOptionError {
                service: service.id.clone(),
                kind: kind.to_string(),
                key: key.to_string(),
            }),
            UnknownKeyPolicy::Ignore => {
                tracing::warn!("⚠️ Ignoring unknown {} '{}' for {}", kind, key, service.id);
                Ok(())
            }
        }
    }
}

fn surcharge(subtotal: u64, multiplier_bps: u64) -> u64 {
    if multiplier_bps <= MULTIPLIER_SCALE {
        return 0;
    }
    let extra = (multiplier_bps - MULTIPLIER_SCALE) as u128;
    let scale = MULTIPLIER_SCALE as u128;
    ((subtotal as u128 * extra + scale / 2) / scale) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{AddOn, DeliveryTier, LengthTier};

    fn article_service() -> ServiceConfig {
        ServiceConfig {
            id: "article".to_string(),
            name: "SEO article".to_string(),
            description: None,
            base_price: None,
            length_tiers: vec![
                LengthTier {
                    key: "1000-2000".to_string(),
                    label: None,
                    min_words: Some(1000),
                    max_words: Some(2000),
                    price: 2500,
                },
                LengthTier {
                    key: "2000-3000".to_string(),
                    label: None,
                    min_words: Some(2000),
                    max_words: Some(3000),
                    price: 4000,
                },
            ],
            add_ons: vec![
                AddOn {
                    key: "images".to_string(),
                    label: "Images".to_string(),
                    price: 800,
                },
                AddOn {
                    key: "infographics".to_string(),
                    label: "Infographics".to_string(),
                    price: 1500,
                },
            ],
            delivery_tiers: vec![
                DeliveryTier {
                    key: "standard".to_string(),
                    label: "Standard".to_string(),
                    multiplier: 1.0,
                    days: Some(5),
                },
                DeliveryTier {
                    key: "urgent".to_string(),
                    label: "Urgent".to_string(),
                    multiplier: 1.5,
                    days: Some(1),
                },
            ],
            fields: vec![],
        }
    }

    fn selection(tier: &str, add_ons: &[&str], delivery: Option<&str>) -> PriceSelection {
        PriceSelection {
            length_tier: Some(tier.to_string()),
            word_count: None,
            add_ons: add_ons.iter().map(|s| s.to_string()).collect(),
            delivery_tier: delivery.map(str::to_string),
        }
    }

    #[test]
    fn test_urgent_order_with_both_add_ons() {
        let calc = PriceCalculator::default();
        let estimate = calc
            .quote(
                &article_service(),
                &selection("2000-3000", &["images", "infographics"], Some("urgent")),
            )
            .unwrap();

        assert_eq!(
            estimate,
            PriceEstimate {
                base_price: 4000,
                add_ons_total: 2300,
                urgency_surcharge: 3150,
                total: 9450,
            }
        );
    }

    #[test]
    fn test_multiplier_of_one_has_no_surcharge() {
        let calc = PriceCalculator::default();
        let estimate = calc
            .quote(&article_service(), &selection("1000-2000", &[], Some("standard")))
            .unwrap();
        assert_eq!(estimate.urgency_surcharge, 0);
        assert_eq!(estimate.total, 2500);
    }

    #[test]
    fn test_total_invariant_for_every_combination() {
        let service = article_service();
        let calc = PriceCalculator::default();
        let add_on_sets: [&[&str]; 4] = [&[], &["images"], &["infographics"], &["images", "infographics"]];

        for tier in ["1000-2000", "2000-3000"] {
            for add_ons in add_on_sets {
                for delivery in [None, Some("standard"), Some("urgent")] {
                    let estimate = calc.quote(&service, &selection(tier, add_ons, delivery)).unwrap();
                    let expected_add_ons: u64 = add_ons
                        .iter()
                        .map(|k| service.add_on(k).unwrap().price)
                        .sum();
                    assert_eq!(estimate.add_ons_total, expected_add_ons);
                    assert_eq!(
                        estimate.total,
                        estimate.base_price + estimate.add_ons_total + estimate.urgency_surcharge
                    );
                    if delivery != Some("urgent") {
                        assert_eq!(estimate.urgency_surcharge, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_adding_add_ons_never_decreases_total() {
        let service = article_service();
        let calc = PriceCalculator::default();
        let mut form = OrderFormState::for_service("article");
        form.select_length_tier("1000-2000");
        form.select_delivery("urgent");

        let before = calc.estimate(&service, &form).unwrap().total;
        form.toggle_add_on("images");
        let with_images = calc.estimate(&service, &form).unwrap().total;
        form.toggle_add_on("infographics");
        let with_both = calc.estimate(&service, &form).unwrap().total;
        assert!(before <= with_images && with_images <= with_both);

        form.toggle_add_on("infographics");
        form.toggle_add_on("images");
        assert_eq!(calc.estimate(&service, &form).unwrap().total, before);
    }

    #[test]
    fn test_word_count_selects_tier() {
        let service = article_service();
        let mut form = OrderFormState::for_service("article");
        form.set_word_count(2400);
        let estimate = PriceCalculator::default().estimate(&service, &form).unwrap();
        assert_eq!(estimate.base_price, 4000);
    }

    #[test]
    fn test_missing_tier_without_flat_price_is_error() {
        let service = article_service();
        let form = OrderFormState::for_service("article");
        assert!(PriceCalculator::default().estimate(&service, &form).is_err());
    }

    #[test]
    fn test_unknown_add_on_rejected_by_default() {
        let err = PriceCalculator::default()
            .quote(&article_service(), &selection("1000-2000", &["video"], None))
            .unwrap_err();
        assert!(matches!(err, PortalError::UnknownOptionError { ref key, .. } if key == "video"));
    }

    #[test]
    fn test_unknown_keys_ignored_with_lenient_policy() {
        let calc = PriceCalculator::new(UnknownKeyPolicy::Ignore);
        let estimate = calc
            .quote(&article_service(), &selection("1000-2000", &["video"], Some("yesterday")))
            .unwrap();
        assert_eq!(estimate.total, 2500);
    }

    #[test]
    fn test_surcharge_rounds_half_up() {
        // 1001 * 0.5 = 500.5
        assert_eq!(surcharge(1001, 15_000), 501);
        assert_eq!(surcharge(1000, 10_000), 0);
        assert_eq!(surcharge(999, 12_500), 250);
    }
}
