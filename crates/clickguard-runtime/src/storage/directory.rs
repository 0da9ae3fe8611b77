//! Static campaign/affiliate directory
//!
//! Campaign and affiliate CRUD lives outside the pipeline; this directory
//! serves a fixed snapshot, typically seeded from a YAML file.

use super::Directory;
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use clickguard_core::{Affiliate, Campaign};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Seed document layout
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub affiliates: Vec<Affiliate>,
}

/// In-memory [`Directory`]
#[derive(Default)]
pub struct StaticDirectory {
    campaigns: RwLock<HashMap<String, Campaign>>,
    affiliates: RwLock<HashMap<String, Affiliate>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        Self {
            campaigns: RwLock::new(
                seed.campaigns
                    .into_iter()
                    .map(|c| (c.id.clone(), c))
                    .collect(),
            ),
            affiliates: RwLock::new(
                seed.affiliates
                    .into_iter()
                    .map(|a| (a.id.clone(), a))
                    .collect(),
            ),
        }
    }

    /// Parse a YAML seed document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let seed: DirectorySeed = serde_yaml::from_str(content)
            .map_err(|e| RuntimeError::Config(format!("invalid directory seed: {}", e)))?;
        Ok(Self::from_seed(seed))
    }

    pub async fn upsert_campaign(&self, campaign: Campaign) {
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), campaign);
    }

    pub async fn upsert_affiliate(&self, affiliate: Affiliate) {
        self.affiliates
            .write()
            .await
            .insert(affiliate.id.clone(), affiliate);
    }

    /// Deactivate a campaign; returns false if unknown
    pub async fn deactivate_campaign(&self, campaign_id: &str) -> bool {
        match self.campaigns.write().await.get_mut(campaign_id) {
            Some(campaign) => {
                campaign.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Number of (campaigns, affiliates)
    pub async fn sizes(&self) -> (usize, usize) {
        (
            self.campaigns.read().await.len(),
            self.affiliates.read().await.len(),
        )
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        Ok(self.campaigns.read().await.get(campaign_id).cloned())
    }

    async fn affiliate(&self, affiliate_id: &str) -> Result<Option<Affiliate>> {
        Ok(self.affiliates.read().await.get(affiliate_id).cloned())
    }
}
