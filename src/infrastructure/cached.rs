use crate::domain::account_range::AccountRange;
use crate::domain::card_number::UnvalidatedCardNumber;
use crate::domain::ports::{AccountRangeService, SharedAccountRangeService};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Remembers lookup answers per BIN and digit count in front of another service.
///
/// The digit count is part of the key because a BIN shared by ranges of
/// different PAN lengths answers differently as the number grows. Misses are
/// cached too. Failed lookups are not cached.
#[derive(Clone)]
pub struct CachingAccountRangeService {
    inner: SharedAccountRangeService,
    cache: Arc<RwLock<HashMap<(String, usize), Option<AccountRange>>>>,
}

impl CachingAccountRangeService {
    pub fn new(inner: SharedAccountRangeService) -> Self {
        Self {
            inner,
            cache: Arc::default(),
        }
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl AccountRangeService for CachingAccountRangeService {
    async fn get_account_range(
        &self,
        number: &UnvalidatedCardNumber,
    ) -> Result<Option<AccountRange>> {
        let Some(bin) = number.bin() else {
            return self.inner.get_account_range(number).await;
        };

        let key = (bin.to_string(), number.len());
        if let Some(cached) = self.cache.read().await.get(&key) {
            return Ok(cached.clone());
        }

        let range = self.inner.get_account_range(number).await?;
        self.cache.write().await.insert(key, range.clone());
        Ok(range)
    }

    fn loading(&self) -> watch::Receiver<bool> {
        self.inner.loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::static_ranges::StaticRangeTable;
    use crate::infrastructure::in_memory::InMemoryAccountRangeService;

    #[tokio::test]
    async fn test_repeated_lookup_is_served_from_cache() {
        let backend = InMemoryAccountRangeService::from_table(&StaticRangeTable::bundled());
        let cached = CachingAccountRangeService::new(Arc::new(backend.clone()));

        let first = cached.get_account_range(&"620000".into()).await.unwrap();
        let second = cached.get_account_range(&"6200 00".into()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.lookup_count(), 1);
        assert_eq!(cached.cached_entries().await, 1);
    }

    #[tokio::test]
    async fn test_same_bin_with_more_digits_asks_again() {
        let backend = InMemoryAccountRangeService::from_table(&StaticRangeTable::bundled());
        let cached = CachingAccountRangeService::new(Arc::new(backend.clone()));

        let short = cached.get_account_range(&"620000".into()).await.unwrap().unwrap();
        let full = cached
            .get_account_range(&"6200000000000005".into())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(short.pan_length, 19);
        assert_eq!(full.pan_length, 16);
        assert_eq!(backend.lookup_count(), 2);
    }

    #[tokio::test]
    async fn test_misses_are_cached_and_failures_are_not() {
        let backend = InMemoryAccountRangeService::new(Vec::new());
        let cached = CachingAccountRangeService::new(Arc::new(backend.clone()));
        assert!(cached.get_account_range(&"111111".into()).await.unwrap().is_none());
        assert!(cached.get_account_range(&"111111".into()).await.unwrap().is_none());
        assert_eq!(backend.lookup_count(), 1);

        let failing = InMemoryAccountRangeService::new(Vec::new()).failing();
        let cached = CachingAccountRangeService::new(Arc::new(failing.clone()));
        assert!(cached.get_account_range(&"424242".into()).await.is_err());
        assert!(cached.get_account_range(&"424242".into()).await.is_err());
        assert_eq!(failing.lookup_count(), 2);
        assert_eq!(cached.cached_entries().await, 0);
    }
}
