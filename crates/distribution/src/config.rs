//! Distribution module configuration
//!
//! Loaded from a TOML file and then overridden from `MERIDIAN_DISTR_*`
//! environment variables. The embedded [`Params`] only seed the store before
//! genesis; once stored, params change through governance proposals.

use crate::errors::{DistributionError, Result};
use crate::keeper::LOG_TARGET;
use crate::types::Params;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const ENV_PREFIX: &str = "MERIDIAN_DISTR_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Module account holding the pools and every outstanding reward.
    pub module_name: String,
    /// Module account fees are collected into during a block.
    pub fee_collector_name: String,
    /// Module account escrowing settled delegator rewards.
    pub rewards_bank_name: String,
    /// Modules whose accounts may not receive withdrawals or spends.
    pub blacklisted_modules: Vec<String>,
    pub params: Params,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            module_name: "distribution".to_string(),
            fee_collector_name: "fee_collector".to_string(),
            rewards_bank_name: "rewards_bank".to_string(),
            blacklisted_modules: vec![
                "fee_collector".to_string(),
                "distribution".to_string(),
                "rewards_bank".to_string(),
                "bonded_tokens_pool".to_string(),
                "not_bonded_tokens_pool".to_string(),
            ],
            params: Params::default(),
        }
    }
}

impl DistributionConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("failed to parse distribution config")?;
        Ok(config)
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!(target: LOG_TARGET, "Loading distribution config from {}", path.display());

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides();
        config
            .validate()
            .with_context(|| format!("invalid distribution config in {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to encode distribution config")
    }

    /// Override fields from `MERIDIAN_DISTR_*` variables. Unparseable values
    /// keep the current setting.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok());
    }

    /// Override fields from `lookup`, keyed by the variable name without the
    /// `MERIDIAN_DISTR_` prefix.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("MODULE_NAME") {
            self.module_name = val;
        }
        if let Some(val) = lookup("FEE_COLLECTOR_NAME") {
            self.fee_collector_name = val;
        }
        if let Some(val) = lookup("REWARDS_BANK_NAME") {
            self.rewards_bank_name = val;
        }
        if let Some(val) = lookup("BLACKLISTED_MODULES") {
            self.blacklisted_modules = val
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        let params = &mut self.params;
        if let Some(val) = lookup("WITHDRAW_ADDR_ENABLED") {
            params.withdraw_addr_enabled = val.parse().unwrap_or(params.withdraw_addr_enabled);
        }
        if let Some(val) = lookup("BASE_PROPOSER_REWARD") {
            if let Ok(rate) = val.parse() {
                params.base_proposer_reward = rate;
            }
        }
        if let Some(val) = lookup("BONUS_PROPOSER_REWARD") {
            if let Ok(rate) = val.parse() {
                params.bonus_proposer_reward = rate;
            }
        }
        if let Some(val) = lookup("PUBLIC_TREASURY_POOL_CAPACITY") {
            params.public_treasury_pool_capacity =
                val.parse().unwrap_or(params.public_treasury_pool_capacity);
        }
        if let Some(val) = lookup("LOCKED_RATIO") {
            if let Ok(ratio) = val.parse() {
                params.locked_ratio = ratio;
            }
        }
        if let Some(val) = lookup("LOCKED_DURATION_SECS") {
            params.locked_duration_secs = val.parse().unwrap_or(params.locked_duration_secs);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("module_name", &self.module_name),
            ("fee_collector_name", &self.fee_collector_name),
            ("rewards_bank_name", &self.rewards_bank_name),
        ] {
            if name.trim().is_empty() {
                return Err(DistributionError::InvalidParams(format!("{field} is empty")));
            }
        }
        if self.module_name == self.rewards_bank_name {
            return Err(DistributionError::InvalidParams(
                "rewards bank must be a separate module account".into(),
            ));
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_types::Dec;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = DistributionConfig::default();
        config.validate().unwrap();
        assert!(config.blacklisted_modules.contains(&"fee_collector".to_string()));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DistributionConfig::from_toml_str(
            r#"
            rewards_bank_name = "escrow"

            [params]
            base_proposer_reward = "0.020000000000000000"
            "#,
        )
        .unwrap();
        assert_eq!(config.rewards_bank_name, "escrow");
        assert_eq!(config.module_name, "distribution");
        assert_eq!(config.params.base_proposer_reward, Dec::percent(2));
        assert_eq!(config.params.bonus_proposer_reward, Dec::percent(4));
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BLACKLISTED_MODULES", "fee_collector, gov ,"),
            ("WITHDRAW_ADDR_ENABLED", "false"),
            ("LOCKED_RATIO", "not-a-number"),
            ("PUBLIC_TREASURY_POOL_CAPACITY", "1000"),
        ]
        .into_iter()
        .collect();

        let mut config = DistributionConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.blacklisted_modules, vec!["fee_collector", "gov"]);
        assert!(!config.params.withdraw_addr_enabled);
        assert_eq!(config.params.locked_ratio, Dec::percent(50));
        assert_eq!(config.params.public_treasury_pool_capacity, 1000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("distribution.toml");
        let mut config = DistributionConfig::default();
        config.params.locked_duration_secs = 3600;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = DistributionConfig::load(&path).unwrap();
        assert_eq!(loaded.params.locked_duration_secs, 3600);
        assert_eq!(loaded.fee_collector_name, config.fee_collector_name);
    }

    #[test]
    fn test_shared_custody_and_bank_rejected() {
        let config = DistributionConfig {
            rewards_bank_name: "distribution".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DistributionError::InvalidParams(_))
        ));
    }
}
