//! Pricing configuration.
//!
//! Two static tables: generation costs (credits debited per dispatch,
//! by job kind) and purchase price tiers (the payment provider's price
//! id mapped to the credits it buys). Neither is user-editable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::JobKind;

/// A purchasable credit bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    /// The payment provider's price identifier.
    pub id: String,

    /// Credits granted when a purchase of this tier completes.
    pub credits: i64,
}

/// Pricing configuration for generations and credit purchases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Credits debited per image generation.
    pub image_cost: i64,

    /// Credits debited per video generation.
    pub video_cost: i64,

    /// Purchase tiers keyed by the provider's price id.
    pub tiers: HashMap<String, PriceTier>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut tiers = HashMap::new();
        for (id, credits) in [
            ("price_starter", 100),
            ("price_studio", 550),
            ("price_agency", 1200),
        ] {
            tiers.insert(
                id.to_string(),
                PriceTier {
                    id: id.to_string(),
                    credits,
                },
            );
        }

        Self {
            image_cost: 5,
            video_cost: 25,
            tiers,
        }
    }
}

impl PricingConfig {
    /// Credits debited when dispatching a job of the given kind.
    #[must_use]
    pub const fn generation_cost(&self, kind: JobKind) -> i64 {
        match kind {
            JobKind::Image => self.image_cost,
            JobKind::Video => self.video_cost,
        }
    }

    /// Resolve a provider price id to the credits it buys.
    ///
    /// Returns `None` for unknown tiers; the webhook handler logs those
    /// for manual review and acknowledges the event without crediting.
    #[must_use]
    pub fn credits_for_tier(&self, tier_id: &str) -> Option<i64> {
        self.tiers.get(tier_id).map(|t| t.credits)
    }
}
