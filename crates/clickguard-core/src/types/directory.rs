//! Campaign and affiliate records owned by the CRUD layer

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub is_active: bool,
    /// Commission in percent of the conversion amount
    #[serde(default)]
    pub commission_rate: f64,
}

/// Running totals of verified conversions per affiliate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateStats {
    pub affiliate_id: String,
    pub verified_conversions: i64,
    pub total_amount: i64,
    pub total_commission: i64,
}

impl AffiliateStats {
    pub fn new(affiliate_id: impl Into<String>) -> Self {
        Self {
            affiliate_id: affiliate_id.into(),
            ..Default::default()
        }
    }

    /// Apply one conversion entering (`sign = 1`) or leaving (`sign = -1`) verified
    pub fn apply(&mut self, amount: i64, commission: i64, sign: i64) {
        self.verified_conversions += sign;
        self.total_amount += sign * amount;
        self.total_commission += sign * commission;
    }
}
