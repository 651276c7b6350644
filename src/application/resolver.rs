use crate::domain::account_range::AccountRange;
use crate::domain::brand::CardBrand;
use crate::domain::card_number::UnvalidatedCardNumber;
use crate::domain::ports::SharedAccountRangeService;
use crate::domain::static_ranges::StaticRangeTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Monotonic counter identifying one edit of the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Which account range, if any, currently describes the digits in the field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResolutionState {
    #[default]
    Unresolved,
    /// Exactly one unambiguous range in the static table.
    StaticFastPath(AccountRange),
    /// A remote lookup launched by this edit generation is outstanding.
    Pending(Generation),
    Resolved(AccountRange),
}

impl ResolutionState {
    pub fn account_range(&self) -> Option<&AccountRange> {
        match self {
            ResolutionState::StaticFastPath(range) | ResolutionState::Resolved(range) => {
                Some(range)
            }
            ResolutionState::Unresolved | ResolutionState::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResolutionState::Pending(_))
    }
}

/// Which brands can never be trusted from the static table alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub remote_brands: BTreeSet<CardBrand>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            remote_brands: BTreeSet::from([CardBrand::Unknown, CardBrand::UnionPay]),
        }
    }
}

impl ResolverConfig {
    pub fn with_remote_brands(brands: impl IntoIterator<Item = CardBrand>) -> Self {
        Self {
            remote_brands: brands.into_iter().collect(),
        }
    }

    pub fn requires_remote(&self, brand: CardBrand) -> bool {
        self.remote_brands.contains(&brand)
    }
}

/// Outcome of a remote lookup, tagged with the edit that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResolution {
    pub generation: Generation,
    pub range: Option<AccountRange>,
}

/// Work finished off the owning thread, waiting to be applied by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverMessage {
    Resolved(RemoteResolution),
    Loading(bool),
}

struct InFlightQuery {
    generation: Generation,
    handle: JoinHandle<()>,
}

/// Delivers the outcome of one lookup task exactly once.
///
/// A task that ends without reporting, because the lookup panicked or the task
/// was aborted, reports "no range" on drop. The owner discards that for any
/// generation that is no longer pending.
struct LookupReport {
    generation: Generation,
    messages: Option<mpsc::UnboundedSender<ResolverMessage>>,
}

impl LookupReport {
    fn send(mut self, range: Option<AccountRange>) {
        self.deliver(range);
    }

    fn deliver(&mut self, range: Option<AccountRange>) {
        let Some(messages) = self.messages.take() else {
            return;
        };
        let generation = self.generation;
        let message = ResolverMessage::Resolved(RemoteResolution { generation, range });
        if messages.send(message).is_err() {
            debug!(generation = generation.value(), "field gone before lookup completed");
        }
    }
}

impl Drop for LookupReport {
    fn drop(&mut self) {
        if self.messages.is_some() {
            debug!(
                generation = self.generation.value(),
                "account range lookup ended without a result"
            );
            self.deliver(None);
        }
    }
}

/// Picks between the static table and the remote service for each edit.
///
/// At most one remote lookup is in flight. Starting a new one, taking the
/// static fast path, or detaching aborts the previous one, and a result that
/// still slips through is rejected unless it belongs to the pending generation.
pub struct AccountRangeResolver {
    table: Arc<StaticRangeTable>,
    service: SharedAccountRangeService,
    config: ResolverConfig,
    runtime: Handle,
    messages: mpsc::UnboundedSender<ResolverMessage>,
    state: ResolutionState,
    in_flight: Option<InFlightQuery>,
    loading_forwarder: Option<JoinHandle<()>>,
}

impl AccountRangeResolver {
    pub fn new(
        table: Arc<StaticRangeTable>,
        service: SharedAccountRangeService,
        config: ResolverConfig,
        runtime: Handle,
        messages: mpsc::UnboundedSender<ResolverMessage>,
    ) -> Self {
        Self {
            table,
            service,
            config,
            runtime,
            messages,
            state: ResolutionState::Unresolved,
            in_flight: None,
            loading_forwarder: None,
        }
    }

    pub fn state(&self) -> &ResolutionState {
        &self.state
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.loading_forwarder.is_some()
    }

    /// Generation of the lookup currently in flight, if any.
    pub fn in_flight(&self) -> Option<Generation> {
        self.in_flight.as_ref().map(|query| query.generation)
    }

    /// Chooses the resolution for the digits of edit `generation`.
    pub fn resolve(
        &mut self,
        number: &UnvalidatedCardNumber,
        generation: Generation,
    ) -> ResolutionState {
        let next = self.next_state(number, generation);
        debug!(generation = generation.value(), state = ?next, "account range resolution");
        self.state = next.clone();
        next
    }

    fn next_state(
        &mut self,
        number: &UnvalidatedCardNumber,
        generation: Generation,
    ) -> ResolutionState {
        let fast_path = match self.table.filter(number).as_slice() {
            [only] if !self.config.requires_remote(only.brand) => Some((*only).clone()),
            _ => None,
        };
        if let Some(range) = fast_path {
            self.cancel_query();
            return ResolutionState::StaticFastPath(range);
        }

        // A confirmed remote range that still covers the digits needs no new
        // lookup, unless other known ranges for them disagree on PAN length.
        if let ResolutionState::Resolved(range) = &self.state
            && number.bin().is_some()
            && range.matches(number)
            && self
                .table
                .filter(number)
                .iter()
                .all(|candidate| candidate.pan_length == range.pan_length)
        {
            return self.state.clone();
        }

        self.cancel_query();
        if number.bin().is_none() {
            return ResolutionState::Unresolved;
        }

        self.launch(number.clone(), generation);
        ResolutionState::Pending(generation)
    }

    fn launch(&mut self, number: UnvalidatedCardNumber, generation: Generation) {
        let service = Arc::clone(&self.service);
        let messages = self.messages.clone();

        let handle = self.runtime.spawn(async move {
            let report = LookupReport {
                generation,
                messages: Some(messages),
            };
            let range = match service.get_account_range(&number).await {
                Ok(range) => range,
                Err(error) => {
                    warn!(%error, generation = generation.value(), "account range lookup failed");
                    None
                }
            };
            report.send(range);
        });

        self.in_flight = Some(InFlightQuery { generation, handle });
    }

    pub fn cancel_query(&mut self) {
        if let Some(query) = self.in_flight.take() {
            query.handle.abort();
            debug!(generation = query.generation.value(), "cancelled account range lookup");
        }
    }

    /// Applies a finished lookup if it belongs to the pending generation.
    ///
    /// Returns the new state, or `None` when the result was stale and dropped.
    pub fn apply_remote(&mut self, resolution: RemoteResolution) -> Option<ResolutionState> {
        let is_current =
            matches!(self.state, ResolutionState::Pending(pending) if pending == resolution.generation);
        if !is_current {
            debug!(
                generation = resolution.generation.value(),
                "discarding superseded account range result"
            );
            return None;
        }

        self.in_flight = None;
        self.state = match resolution.range {
            Some(range) => ResolutionState::Resolved(range),
            None => ResolutionState::Unresolved,
        };
        Some(self.state.clone())
    }

    /// Starts forwarding the service's loading stream to the owner.
    pub fn attach(&mut self) {
        if self.loading_forwarder.is_some() {
            return;
        }

        let mut loading = self.service.loading();
        let messages = self.messages.clone();
        self.loading_forwarder = Some(self.runtime.spawn(async move {
            let initial = *loading.borrow_and_update();
            if messages.send(ResolverMessage::Loading(initial)).is_err() {
                return;
            }
            while loading.changed().await.is_ok() {
                let value = *loading.borrow_and_update();
                if messages.send(ResolverMessage::Loading(value)).is_err() {
                    break;
                }
            }
        }));
    }

    /// Stops all background work: the loading forwarder and any lookup.
    pub fn detach(&mut self) {
        if let Some(forwarder) = self.loading_forwarder.take() {
            forwarder.abort();
        }
        self.cancel_query();
        if self.state.is_pending() {
            self.state = ResolutionState::Unresolved;
        }
    }
}

impl Drop for AccountRangeResolver {
    fn drop(&mut self) {
        self.detach();
    }
}
