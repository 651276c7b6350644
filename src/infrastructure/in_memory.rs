use super::loading::LoadingTracker;
use crate::domain::account_range::AccountRange;
use crate::domain::card_number::UnvalidatedCardNumber;
use crate::domain::ports::AccountRangeService;
use crate::domain::static_ranges::StaticRangeTable;
use crate::error::{CardEntryError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// An account range lookup answered from memory.
///
/// Stands in for the remote service: it only answers once a BIN is present,
/// can be slowed down or made to fail, and drives a loading stream exactly
/// like a networked implementation would.
#[derive(Debug, Clone)]
pub struct InMemoryAccountRangeService {
    ranges: Arc<Vec<AccountRange>>,
    latency: Duration,
    fail: bool,
    lookups: Arc<AtomicUsize>,
    loading: LoadingTracker,
}

impl InMemoryAccountRangeService {
    pub fn new(ranges: Vec<AccountRange>) -> Self {
        Self {
            ranges: Arc::new(ranges),
            latency: Duration::ZERO,
            fail: false,
            lookups: Arc::new(AtomicUsize::new(0)),
            loading: LoadingTracker::new(),
        }
    }

    /// Serves every range of `table`.
    pub fn from_table(table: &StaticRangeTable) -> Self {
        Self::new(table.ranges().to_vec())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every lookup returns a `LookupError`.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of lookups that reached the data set.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRangeService for InMemoryAccountRangeService {
    async fn get_account_range(
        &self,
        number: &UnvalidatedCardNumber,
    ) -> Result<Option<AccountRange>> {
        let Some(bin) = number.bin() else {
            return Ok(None);
        };

        let _loading = self.loading.begin();
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail {
            return Err(CardEntryError::LookupError(format!(
                "no account range data for BIN {bin}"
            )));
        }

        // An exact length match confirms the range. Otherwise the longest one
        // keeps every digit still to come enterable.
        let candidates: Vec<&AccountRange> = self
            .ranges
            .iter()
            .filter(|range| range.matches(number))
            .collect();
        let range = candidates
            .iter()
            .find(|range| range.pan_length == number.len())
            .or_else(|| candidates.iter().max_by_key(|range| range.pan_length));
        Ok(range.map(|range| (*range).clone()))
    }

    fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}
