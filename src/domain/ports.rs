use super::account_range::AccountRange;
use super::card_number::UnvalidatedCardNumber;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Remote account range lookup, the only asynchronous collaborator of the field.
///
/// Implementations own their transport, timeouts and retries. A lookup may be
/// dropped mid-flight when the edit that started it is superseded.
#[async_trait]
pub trait AccountRangeService: Send + Sync {
    async fn get_account_range(
        &self,
        number: &UnvalidatedCardNumber,
    ) -> Result<Option<AccountRange>>;

    /// `true` while at least one lookup is outstanding.
    fn loading(&self) -> watch::Receiver<bool>;
}

pub type SharedAccountRangeService = Arc<dyn AccountRangeService>;
