//! Deterministic staking and supply keepers for tests and simulations.
//!
//! Both mocks keep their state in the same [`meridian_storage::KvStore`] as the distribution
//! records, under prefixes the distribution module never uses, so atomic and
//! isolated contexts roll their changes back together with the ledger.

use crate::config::DistributionConfig;
use crate::expected_keepers::{DelegationInfo, StakingKeeper, SupplyKeeper, ValidatorInfo};
use crate::keeper::{Keeper, StakingHooks};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use meridian_storage::{BlockHeader, Context, MemoryStore};
use meridian_types::{AccAddress, Coins, ConsAddress, Dec, ValAddress};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

const MOCK_VALIDATOR_PREFIX: u8 = 0xF0;
const MOCK_CONS_INDEX_PREFIX: u8 = 0xF1;
const MOCK_DELEGATION_PREFIX: u8 = 0xF2;
const MOCK_BALANCE_PREFIX: u8 = 0xE0;
const MOCK_SUPPLY_KEY: &[u8] = &[0xE1];

/// Denomination used by the fixtures.
pub const TEST_DENOM: &str = "umer";

fn key(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![prefix];
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

// -----------------------------------------------------------------------------
// Staking
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockValidator {
    info: ValidatorInfo,
    /// LP tokens minted per bonded token delegated.
    lp_per_token: u128,
}

/// Staking module backed by the shared store, firing [`StakingHooks`] the way
/// a real staking module would.
pub struct MockStaking {
    hooks: RwLock<Option<Weak<dyn StakingHooks>>>,
    lp_distribution_ratio: RwLock<Dec>,
    max_delegations_ratio: Dec,
}

impl MockStaking {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(None),
            lp_distribution_ratio: RwLock::new(Dec::zero()),
            max_delegations_ratio: Dec::one(),
        }
    }

    /// Register the listener notified of lifecycle events. Held weakly so
    /// the keeper and its staking module can own each other.
    pub fn set_hooks(&self, hooks: Weak<dyn StakingHooks>) {
        *self.hooks.write() = Some(hooks);
    }

    /// Weight of LP power in distribution power.
    pub fn set_lp_distribution_ratio(&self, ratio: Dec) {
        *self.lp_distribution_ratio.write() = ratio;
    }

    fn hooks(&self) -> Option<Arc<dyn StakingHooks>> {
        self.hooks.read().as_ref().and_then(Weak::upgrade)
    }

    fn load(&self, ctx: &Context<'_>, operator: &ValAddress) -> Result<Option<MockValidator>> {
        Ok(ctx.get_json(&key(MOCK_VALIDATOR_PREFIX, &[operator.as_bytes()]))?)
    }

    fn require(&self, ctx: &Context<'_>, operator: &ValAddress) -> Result<MockValidator> {
        self.load(ctx, operator)?
            .ok_or_else(|| anyhow!("validator {operator} not found"))
    }

    fn save(&self, ctx: &Context<'_>, validator: &MockValidator) -> Result<()> {
        let operator = validator.info.operator;
        ctx.set_json(&key(MOCK_VALIDATOR_PREFIX, &[operator.as_bytes()]), validator)?;
        ctx.set_json(
            &key(MOCK_CONS_INDEX_PREFIX, &[validator.info.consensus.as_bytes()]),
            &operator,
        )?;
        Ok(())
    }

    fn delegation_key(delegator: &AccAddress, validator: &ValAddress) -> Vec<u8> {
        key(
            MOCK_DELEGATION_PREFIX,
            &[delegator.as_bytes(), validator.as_bytes()],
        )
    }

    /// Register a validator without stake and fire `after_validator_created`.
    pub fn create_validator(
        &self,
        ctx: &Context<'_>,
        operator: ValAddress,
        consensus: ConsAddress,
        commission_rate: Dec,
    ) -> Result<ValidatorInfo> {
        self.create_validator_with_lp(ctx, operator, consensus, commission_rate, 0)
    }

    /// Like [`Self::create_validator`], but every delegated token also backs
    /// `lp_per_token` liquidity-provider tokens.
    pub fn create_validator_with_lp(
        &self,
        ctx: &Context<'_>,
        operator: ValAddress,
        consensus: ConsAddress,
        commission_rate: Dec,
        lp_per_token: u128,
    ) -> Result<ValidatorInfo> {
        if self.load(ctx, &operator)?.is_some() {
            bail!("validator {operator} already exists");
        }
        let validator = MockValidator {
            info: ValidatorInfo {
                operator,
                consensus,
                tokens: 0,
                lp_tokens: 0,
                delegator_shares: Dec::zero(),
                commission_rate,
                jailed: false,
            },
            lp_per_token,
        };
        self.save(ctx, &validator)?;
        if let Some(hooks) = self.hooks() {
            hooks.after_validator_created(ctx, &operator)?;
        }
        Ok(validator.info)
    }

    /// Bond `amount` tokens from `delegator`. Returns the shares issued.
    pub fn delegate(
        &self,
        ctx: &Context<'_>,
        delegator: AccAddress,
        operator: ValAddress,
        amount: u128,
    ) -> Result<Dec> {
        let mut validator = self.require(ctx, &operator)?;
        let existing = self.delegation(ctx, &delegator, &operator)?;

        if let Some(hooks) = self.hooks() {
            if existing.is_some() {
                hooks.before_delegation_shares_modified(ctx, &delegator, &operator)?;
            } else {
                hooks.before_delegation_created(ctx, &delegator, &operator)?;
            }
        }

        let info = &mut validator.info;
        let shares = if info.delegator_shares.is_zero() {
            Dec::from_u128(amount)
        } else if info.tokens == 0 {
            bail!("validator {operator} has shares but no tokens");
        } else {
            info.delegator_shares
                .mul_int(amount)
                .quo_truncate(&Dec::from_u128(info.tokens))
        };
        info.tokens += amount;
        info.lp_tokens += amount * validator.lp_per_token;
        info.delegator_shares += &shares;
        self.save(ctx, &validator)?;

        let mut delegation = existing.unwrap_or(DelegationInfo {
            delegator,
            validator: operator,
            shares: Dec::zero(),
        });
        delegation.shares += &shares;
        ctx.set_json(&Self::delegation_key(&delegator, &operator), &delegation)?;

        if let Some(hooks) = self.hooks() {
            hooks.after_delegation_modified(ctx, &delegator, &operator)?;
        }
        Ok(shares)
    }

    /// Unbond `shares` of a delegation. Returns the tokens released.
    pub fn undelegate(
        &self,
        ctx: &Context<'_>,
        delegator: AccAddress,
        operator: ValAddress,
        shares: Dec,
    ) -> Result<u128> {
        let mut validator = self.require(ctx, &operator)?;
        let Some(mut delegation) = self.delegation(ctx, &delegator, &operator)? else {
            bail!("delegation of {delegator} to {operator} not found");
        };
        if shares > delegation.shares {
            bail!("cannot unbond {shares} shares, only {} held", delegation.shares);
        }

        if let Some(hooks) = self.hooks() {
            hooks.before_delegation_shares_modified(ctx, &delegator, &operator)?;
        }

        let info = &mut validator.info;
        let tokens = info
            .tokens_from_shares_truncated(&shares)
            .truncate_u128()
            .unwrap_or(0);
        let lp_tokens = info
            .lp_tokens_from_shares_truncated(&shares)
            .truncate_u128()
            .unwrap_or(0);
        info.tokens -= tokens;
        info.lp_tokens -= lp_tokens;
        info.delegator_shares -= &shares;
        self.save(ctx, &validator)?;

        delegation.shares -= &shares;
        let delegation_key = Self::delegation_key(&delegator, &operator);
        if delegation.shares.is_zero() {
            ctx.delete(&delegation_key)?;
        } else {
            ctx.set_json(&delegation_key, &delegation)?;
        }

        if let Some(hooks) = self.hooks() {
            hooks.after_delegation_modified(ctx, &delegator, &operator)?;
        }
        Ok(tokens)
    }

    /// Drop a validator and fire `after_validator_removed`.
    pub fn remove_validator(&self, ctx: &Context<'_>, operator: ValAddress) -> Result<()> {
        let validator = self.require(ctx, &operator)?;
        ctx.delete(&key(MOCK_VALIDATOR_PREFIX, &[operator.as_bytes()]))?;
        ctx.delete(&key(
            MOCK_CONS_INDEX_PREFIX,
            &[validator.info.consensus.as_bytes()],
        ))?;
        if let Some(hooks) = self.hooks() {
            hooks.after_validator_removed(ctx, &validator.info.consensus, &operator)?;
        }
        Ok(())
    }
}

impl Default for MockStaking {
    fn default() -> Self {
        Self::new()
    }
}

impl StakingKeeper for MockStaking {
    fn validator(&self, ctx: &Context<'_>, operator: &ValAddress) -> Result<Option<ValidatorInfo>> {
        Ok(self.load(ctx, operator)?.map(|v| v.info))
    }

    fn validator_by_cons_addr(
        &self,
        ctx: &Context<'_>,
        consensus: &ConsAddress,
    ) -> Result<Option<ValidatorInfo>> {
        let operator: Option<ValAddress> =
            ctx.get_json(&key(MOCK_CONS_INDEX_PREFIX, &[consensus.as_bytes()]))?;
        match operator {
            Some(operator) => self.validator(ctx, &operator),
            None => Ok(None),
        }
    }

    fn delegation(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
        validator: &ValAddress,
    ) -> Result<Option<DelegationInfo>> {
        Ok(ctx.get_json(&Self::delegation_key(delegator, validator))?)
    }

    fn delegator_delegations(
        &self,
        ctx: &Context<'_>,
        delegator: &AccAddress,
    ) -> Result<Vec<DelegationInfo>> {
        Ok(ctx
            .prefix_scan_json::<DelegationInfo>(&key(
                MOCK_DELEGATION_PREFIX,
                &[delegator.as_bytes()],
            ))?
            .into_iter()
            .map(|(_, delegation)| delegation)
            .collect())
    }

    fn validator_delegations(
        &self,
        ctx: &Context<'_>,
        validator: &ValAddress,
    ) -> Result<Vec<DelegationInfo>> {
        Ok(self
            .delegations(ctx)?
            .into_iter()
            .filter(|d| d.validator == *validator)
            .collect())
    }

    fn validators(&self, ctx: &Context<'_>) -> Result<Vec<ValidatorInfo>> {
        Ok(ctx
            .prefix_scan_json::<MockValidator>(&[MOCK_VALIDATOR_PREFIX])?
            .into_iter()
            .map(|(_, v)| v.info)
            .collect())
    }

    fn delegations(&self, ctx: &Context<'_>) -> Result<Vec<DelegationInfo>> {
        Ok(ctx
            .prefix_scan_json::<DelegationInfo>(&[MOCK_DELEGATION_PREFIX])?
            .into_iter()
            .map(|(_, delegation)| delegation)
            .collect())
    }

    fn jail(&self, ctx: &Context<'_>, consensus: &ConsAddress) -> Result<()> {
        let info = self
            .validator_by_cons_addr(ctx, consensus)?
            .ok_or_else(|| anyhow!("no validator with consensus address {consensus}"))?;
        let mut validator = self.require(ctx, &info.operator)?;
        validator.info.jailed = true;
        self.save(ctx, &validator)
    }

    fn slash(
        &self,
        ctx: &Context<'_>,
        consensus: &ConsAddress,
        _infraction_height: u64,
        fraction: &Dec,
    ) -> Result<u128> {
        let info = self
            .validator_by_cons_addr(ctx, consensus)?
            .ok_or_else(|| anyhow!("no validator with consensus address {consensus}"))?;

        if let Some(hooks) = self.hooks() {
            hooks.before_validator_slashed(ctx, &info.operator, fraction)?;
        }

        let mut validator = self.require(ctx, &info.operator)?;
        let burned = Dec::from_u128(validator.info.tokens)
            .mul_truncate(fraction)
            .truncate_u128()
            .unwrap_or(0);
        let lp_burned = Dec::from_u128(validator.info.lp_tokens)
            .mul_truncate(fraction)
            .truncate_u128()
            .unwrap_or(0);
        validator.info.tokens -= burned;
        validator.info.lp_tokens -= lp_burned;
        self.save(ctx, &validator)?;
        Ok(burned)
    }

    fn lp_distribution_ratio(&self, _ctx: &Context<'_>) -> Result<Dec> {
        Ok(self.lp_distribution_ratio.read().clone())
    }

    fn max_delegations_ratio(&self, _ctx: &Context<'_>) -> Result<Dec> {
        Ok(self.max_delegations_ratio.clone())
    }

    fn total_bonded_tokens(&self, ctx: &Context<'_>) -> Result<u128> {
        Ok(self
            .validators(ctx)?
            .iter()
            .filter(|v| !v.jailed)
            .map(|v| v.tokens)
            .sum())
    }
}

// -----------------------------------------------------------------------------
// Supply
// -----------------------------------------------------------------------------

/// Bank module backed by the shared store.
#[derive(Debug, Default)]
pub struct MockSupply;

impl MockSupply {
    pub fn new() -> Self {
        Self
    }

    fn balance_key(addr: &AccAddress) -> Vec<u8> {
        key(MOCK_BALANCE_PREFIX, &[addr.as_bytes()])
    }

    fn credit(&self, ctx: &Context<'_>, addr: &AccAddress, amount: &Coins) -> Result<()> {
        let balance = self.balance(ctx, addr)?;
        ctx.set_json(&Self::balance_key(addr), &balance.add(amount))?;
        Ok(())
    }

    fn debit(&self, ctx: &Context<'_>, addr: &AccAddress, amount: &Coins) -> Result<()> {
        let balance = self.balance(ctx, addr)?;
        let Some(rest) = balance.checked_sub(amount) else {
            bail!("insufficient funds in {addr}: have {balance}, need {amount}");
        };
        ctx.set_json(&Self::balance_key(addr), &rest)?;
        Ok(())
    }

    /// Mint coins straight into an account, e.g. to seed a depositor.
    pub fn fund_account(&self, ctx: &Context<'_>, addr: &AccAddress, amount: &Coins) -> Result<()> {
        self.credit(ctx, addr, amount)?;
        let total = self.total_supply(ctx)?;
        ctx.set_json(MOCK_SUPPLY_KEY, &total.add(amount))?;
        Ok(())
    }

    pub fn total_supply(&self, ctx: &Context<'_>) -> Result<Coins> {
        Ok(ctx.get_json(MOCK_SUPPLY_KEY)?.unwrap_or_default())
    }
}

impl SupplyKeeper for MockSupply {
    fn balance(&self, ctx: &Context<'_>, addr: &AccAddress) -> Result<Coins> {
        Ok(ctx.get_json(&Self::balance_key(addr))?.unwrap_or_default())
    }

    fn send_coins_from_module_to_module(
        &self,
        ctx: &Context<'_>,
        sender_module: &str,
        recipient_module: &str,
        amount: &Coins,
    ) -> Result<()> {
        self.debit(ctx, &self.module_address(sender_module), amount)?;
        self.credit(ctx, &self.module_address(recipient_module), amount)
    }

    fn send_coins_from_module_to_account(
        &self,
        ctx: &Context<'_>,
        sender_module: &str,
        recipient: &AccAddress,
        amount: &Coins,
    ) -> Result<()> {
        self.debit(ctx, &self.module_address(sender_module), amount)?;
        self.credit(ctx, recipient, amount)
    }

    fn send_coins_from_account_to_module(
        &self,
        ctx: &Context<'_>,
        sender: &AccAddress,
        recipient_module: &str,
        amount: &Coins,
    ) -> Result<()> {
        self.debit(ctx, sender, amount)?;
        self.credit(ctx, &self.module_address(recipient_module), amount)
    }

    fn mint_coins(&self, ctx: &Context<'_>, module: &str, amount: &Coins) -> Result<()> {
        self.fund_account(ctx, &self.module_address(module), amount)
    }

    fn burn_coins(&self, ctx: &Context<'_>, module: &str, amount: &Coins) -> Result<()> {
        self.debit(ctx, &self.module_address(module), amount)?;
        let total = self.total_supply(ctx)?;
        let rest = total
            .checked_sub(amount)
            .ok_or_else(|| anyhow!("burn of {amount} exceeds supply {total}"))?;
        ctx.set_json(MOCK_SUPPLY_KEY, &rest)?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Fixture
// -----------------------------------------------------------------------------

/// A keeper wired to the mocks over an in-memory store.
pub struct TestEnv {
    pub store: MemoryStore,
    pub staking: Arc<MockStaking>,
    pub supply: Arc<MockSupply>,
    pub keeper: Arc<Keeper>,
}

impl TestEnv {
    pub fn new(config: DistributionConfig) -> Self {
        let staking = Arc::new(MockStaking::new());
        let supply = Arc::new(MockSupply::new());
        let keeper = Arc::new(Keeper::new(config, staking.clone(), supply.clone()));
        let hooks: Arc<dyn StakingHooks> = keeper.clone();
        staking.set_hooks(Arc::downgrade(&hooks));
        Self {
            store: MemoryStore::new(),
            staking,
            supply,
            keeper,
        }
    }

    /// Genesis time of the fixture chain.
    pub fn genesis_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Context at `height`, five seconds per block after genesis.
    pub fn ctx(&self, height: u64) -> Context<'_> {
        let offset = Duration::seconds(5 * height as i64);
        self.ctx_at(height, Self::genesis_time() + offset)
    }

    pub fn ctx_at(&self, height: u64, time: DateTime<Utc>) -> Context<'_> {
        Context::new(&self.store, BlockHeader::new("meridian-test", height, time))
    }

    /// Put `amount` of the fixture denom into the fee collector.
    pub fn collect_fees(&self, ctx: &Context<'_>, amount: u128) -> Result<()> {
        self.supply.mint_coins(
            ctx,
            &self.keeper.config().fee_collector_name,
            &Coins::from_coin(TEST_DENOM, amount),
        )
    }

    pub fn balance_of(&self, ctx: &Context<'_>, addr: &AccAddress) -> Result<u128> {
        Ok(self.supply.balance(ctx, addr)?.amount_of(TEST_DENOM))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new(DistributionConfig::default())
    }
}

/// Deterministic addresses for fixtures: the byte is repeated.
pub fn val_addr(byte: u8) -> ValAddress {
    ValAddress::new([byte; meridian_types::ADDRESS_BYTES])
}

pub fn cons_addr(byte: u8) -> ConsAddress {
    ConsAddress::new([byte; meridian_types::ADDRESS_BYTES])
}

pub fn acc_addr(byte: u8) -> AccAddress {
    AccAddress::new([byte; meridian_types::ADDRESS_BYTES])
}
