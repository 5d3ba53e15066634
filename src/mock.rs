//! In-process collaborators for testing.
//!
//! Configurable responses and call counters, so tests can assert how many
//! remote round trips an operation cost.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{MarketError, Result};
use crate::traits::{LedgerReader, LedgerWriter, ValuationSource, VaultReader};
use crate::types::{
    Assets, CurveId, EntityDefinition, EntityId, Shares, Triple, UserPosition, VaultTotals,
};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// Curve
// =============================================================================

type Pricing = Box<dyn Fn(Shares) -> Assets + Send + Sync>;

/// Mock bonding curve.
pub struct MockCurve {
    pricing: Pricing,
    available: AtomicBool,
    /// Quantities that fail even while the curve is available
    failing: Mutex<HashSet<Shares>>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    calls_by_shares: Mutex<HashMap<Shares, usize>>,
    last_request: Mutex<Option<(Shares, Shares, Assets, CurveId)>>,
}

impl MockCurve {
    /// Curve priced by `pricing(shares)`
    pub fn new(pricing: impl Fn(Shares) -> Assets + Send + Sync + 'static) -> Self {
        Self {
            pricing: Box::new(pricing),
            available: AtomicBool::new(true),
            failing: Mutex::new(HashSet::new()),
            delay: None,
            call_count: AtomicUsize::new(0),
            calls_by_shares: Mutex::new(HashMap::new()),
            last_request: Mutex::new(None),
        }
    }

    /// `price == shares`
    pub fn identity() -> Self {
        Self::new(|shares| shares)
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every conversion of exactly `shares`
    pub fn with_failure_at(self, shares: Shares) -> Self {
        self.fail_at(shares);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_at(&self, shares: Shares) {
        locked(&self.failing).insert(shares);
    }

    pub fn clear_failures(&self) {
        locked(&self.failing).clear();
    }

    /// Number of `convert_to_assets` calls
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Number of `convert_to_assets` calls for one quantity
    pub fn calls_for(&self, shares: Shares) -> usize {
        locked(&self.calls_by_shares).get(&shares).copied().unwrap_or(0)
    }

    /// Arguments of the latest `convert_to_assets` call
    pub fn last_request(&self) -> Option<(Shares, Shares, Assets, CurveId)> {
        *locked(&self.last_request)
    }

    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        locked(&self.calls_by_shares).clear();
    }
}

#[async_trait]
impl ValuationSource for MockCurve {
    async fn convert_to_assets(
        &self,
        shares: Shares,
        total_shares: Shares,
        total_assets: Assets,
        curve_id: CurveId,
    ) -> Result<Assets> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *locked(&self.calls_by_shares).entry(shares).or_insert(0) += 1;
        *locked(&self.last_request) = Some((shares, total_shares, total_assets, curve_id));

        pause(self.delay).await;

        if !self.available.load(Ordering::SeqCst) {
            return Err(MarketError::RemoteUnavailable("Mock curve disabled".to_string()));
        }
        if locked(&self.failing).contains(&shares) {
            return Err(MarketError::RemoteUnavailable(format!(
                "Mock curve failed at {} shares",
                shares
            )));
        }
        Ok((self.pricing)(shares))
    }

    async fn curve_name(&self, curve_id: CurveId) -> Result<String> {
        Ok(format!("Mock Curve {}", curve_id))
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// Mock ledger: an indexer and a writer over the same in-memory state.
///
/// Created entities become visible to `find_entity` immediately.
pub struct MockLedger {
    entities: Mutex<HashMap<EntityDefinition, EntityId>>,
    triples: Mutex<Vec<Triple>>,
    next_id: AtomicU64,
    available: AtomicBool,
    /// Triple writes beyond this many stored triples fail
    triple_budget: AtomicUsize,
    delay: Option<Duration>,
    entity_lookups: AtomicUsize,
    entity_writes: AtomicUsize,
    triple_writes: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            triples: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1_000),
            available: AtomicBool::new(true),
            triple_budget: AtomicUsize::new(usize::MAX),
            delay: None,
            entity_lookups: AtomicUsize::new(0),
            entity_writes: AtomicUsize::new(0),
            triple_writes: AtomicUsize::new(0),
        }
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every entity lookup and write
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Accept only `budget` triples in total; later writes fail
    pub fn with_triple_budget(self, budget: usize) -> Self {
        self.set_triple_budget(budget);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_triple_budget(&self, budget: usize) {
        self.triple_budget.store(budget, Ordering::SeqCst);
    }

    /// Seed an entity as if another process had created it
    pub fn preload(&self, definition: EntityDefinition, id: EntityId) {
        locked(&self.entities).insert(definition, id);
    }

    pub fn entity_lookups(&self) -> usize {
        self.entity_lookups.load(Ordering::SeqCst)
    }

    pub fn entity_writes(&self) -> usize {
        self.entity_writes.load(Ordering::SeqCst)
    }

    /// `create_triple` calls, successful or not
    pub fn triple_writes(&self) -> usize {
        self.triple_writes.load(Ordering::SeqCst)
    }

    /// Stored triples, in write order
    pub fn triples(&self) -> Vec<Triple> {
        locked(&self.triples).clone()
    }

    pub fn entity_count(&self) -> usize {
        locked(&self.entities).len()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MarketError::RemoteUnavailable("Mock ledger disabled".to_string()))
        }
    }

    fn allocate_id(&self) -> EntityId {
        EntityId(u128::from(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn find_entity(&self, definition: &EntityDefinition) -> Result<Option<EntityId>> {
        self.entity_lookups.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.check_available()?;
        Ok(locked(&self.entities).get(definition).copied())
    }
}

#[async_trait]
impl LedgerWriter for MockLedger {
    async fn create_entity(&self, definition: &EntityDefinition) -> Result<EntityId> {
        self.entity_writes.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.check_available()?;

        // A real ledger would mint a second entity here; so do we.
        let id = self.allocate_id();
        locked(&self.entities).insert(definition.clone(), id);
        Ok(id)
    }

    async fn create_triple(&self, triple: &Triple) -> Result<EntityId> {
        self.triple_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut triples = locked(&self.triples);
        if triples.len() >= self.triple_budget.load(Ordering::SeqCst) {
            return Err(MarketError::RemoteUnavailable(format!(
                "Mock ledger rejected triple {}",
                triple
            )));
        }
        triples.push(*triple);
        drop(triples);

        Ok(self.allocate_id())
    }
}

// =============================================================================
// Vaults
// =============================================================================

/// Mock vault state keyed by term.
///
/// Curve vaults share the default vault's numbers.
#[derive(Default)]
pub struct MockVault {
    totals: HashMap<EntityId, VaultTotals>,
    positions: HashMap<(EntityId, String), UserPosition>,
    prices: HashMap<EntityId, Assets>,
    reads: AtomicUsize,
    last_curve_id: Mutex<Option<CurveId>>,
}

impl MockVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals(mut self, term_id: EntityId, totals: VaultTotals) -> Self {
        self.totals.insert(term_id, totals);
        self
    }

    pub fn with_position(mut self, term_id: EntityId, account: &str, position: UserPosition) -> Self {
        self.positions.insert((term_id, account.to_string()), position);
        self
    }

    pub fn with_share_price(mut self, term_id: EntityId, price: Assets) -> Self {
        self.prices.insert(term_id, price);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Curve of the latest curve-vault read
    pub fn last_curve_id(&self) -> Option<CurveId> {
        *locked(&self.last_curve_id)
    }

    fn record_curve(&self, curve_id: CurveId) {
        *locked(&self.last_curve_id) = Some(curve_id);
    }

    fn totals_for(&self, term_id: EntityId) -> Result<VaultTotals> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.totals
            .get(&term_id)
            .copied()
            .ok_or_else(|| MarketError::InvalidResponse(format!("No vault for term {}", term_id)))
    }
}

#[async_trait]
impl VaultReader for MockVault {
    async fn vault_totals(&self, term_id: EntityId) -> Result<VaultTotals> {
        self.totals_for(term_id)
    }

    async fn curve_vault_totals(&self, term_id: EntityId, curve_id: CurveId) -> Result<VaultTotals> {
        self.record_curve(curve_id);
        self.totals_for(term_id)
    }

    async fn user_position(
        &self,
        term_id: EntityId,
        curve_id: CurveId,
        account: &str,
    ) -> Result<UserPosition> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.record_curve(curve_id);
        Ok(self
            .positions
            .get(&(term_id, account.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn current_share_price(&self, term_id: EntityId, curve_id: CurveId) -> Result<Assets> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.record_curve(curve_id);
        self.prices
            .get(&term_id)
            .copied()
            .ok_or_else(|| MarketError::InvalidResponse(format!("No price for term {}", term_id)))
    }
}
