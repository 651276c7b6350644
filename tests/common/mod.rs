#![allow(dead_code)]

use async_trait::async_trait;
use card_entry::application::coordinator::{EditCoordinator, FieldEvent, TextEdit};
use card_entry::application::resolver::ResolverConfig;
use card_entry::domain::account_range::AccountRange;
use card_entry::domain::card_number::UnvalidatedCardNumber;
use card_entry::domain::ports::AccountRangeService;
use card_entry::domain::static_ranges::StaticRangeTable;
use card_entry::error::{CardEntryError, Result};
use card_entry::infrastructure::in_memory::InMemoryAccountRangeService;
use card_entry::infrastructure::loading::LoadingTracker;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, broadcast, watch};

/// A lookup service whose answers are held back until the test releases them.
///
/// Counts how many lookups started, how many ran to completion and how many
/// are outstanding right now, so tests can observe cancellation.
#[derive(Clone)]
pub struct GatedAccountRangeService {
    backend: InMemoryAccountRangeService,
    gate: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    fail: bool,
    loading: LoadingTracker,
}

impl GatedAccountRangeService {
    pub fn new() -> Self {
        Self {
            backend: InMemoryAccountRangeService::from_table(&StaticRangeTable::bundled()),
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::default(),
            completed: Arc::default(),
            in_flight: Arc::default(),
            fail: false,
            loading: LoadingTracker::new(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Lets `n` held lookups answer.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Lookups started and neither finished nor cancelled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRangeService for GatedAccountRangeService {
    async fn get_account_range(
        &self,
        number: &UnvalidatedCardNumber,
    ) -> Result<Option<AccountRange>> {
        let _loading = self.loading.begin();
        let _in_flight = InFlight::enter(&self.in_flight);
        self.started.fetch_add(1, Ordering::SeqCst);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| CardEntryError::LookupError(e.to_string()))?;
        permit.forget();

        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CardEntryError::LookupError("gate failure".to_string()));
        }
        self.backend.get_account_range(number).await
    }

    fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}

pub fn bundled_service() -> InMemoryAccountRangeService {
    InMemoryAccountRangeService::from_table(&StaticRangeTable::bundled())
}

pub fn field_with(service: Arc<dyn AccountRangeService>) -> EditCoordinator {
    EditCoordinator::new(
        service,
        StaticRangeTable::bundled(),
        ResolverConfig::default(),
        Handle::current(),
    )
}

/// Types `digits` one keystroke at a time at the cursor.
pub fn type_digits(field: &mut EditCoordinator, digits: &str) {
    for digit in digits.chars() {
        let at = field.cursor();
        field.apply_edit(TextEdit::insert(at, digit.to_string()));
    }
}

pub fn backspace(field: &mut EditCoordinator, times: usize) {
    for _ in 0..times {
        let at = field.cursor();
        if at == 0 {
            break;
        }
        field.apply_edit(TextEdit::delete(at - 1, 1));
    }
}

pub fn drain_events(events: &mut broadcast::Receiver<FieldEvent>) -> Vec<FieldEvent> {
    let mut fired = Vec::new();
    while let Ok(event) = events.try_recv() {
        fired.push(event);
    }
    fired
}

/// Lets spawned lookup tasks run on a current-thread runtime.
pub async fn run_spawned_tasks() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn write_script(path: &Path, rows: &[[&str; 4]]) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["action", "start", "removed", "text"])?;
    for row in rows {
        wtr.write_record(row)?;
    }

    wtr.flush()?;
    Ok(())
}
