use super::cursor::compute_cursor;
use super::resolver::{
    AccountRangeResolver, Generation, ResolutionState, ResolverConfig, ResolverMessage,
};
use crate::domain::account_range::AccountRange;
use crate::domain::brand::CardBrand;
use crate::domain::card_number::{
    DEFAULT_PAN_LENGTH, MAX_PAN_LENGTH, MIN_PASTE_LENGTH, UnvalidatedCardNumber,
    ValidatedCardNumber, formatted_pan_length,
};
use crate::domain::ports::SharedAccountRangeService;
use crate::domain::static_ranges::StaticRangeTable;
use crate::error::{CardEntryError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

/// A single change to the field text: `removed` characters at `start` are
/// replaced by `inserted`. Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub removed: usize,
    pub inserted: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            removed: 0,
            inserted: text.into(),
        }
    }

    pub fn delete(start: usize, count: usize) -> Self {
        Self {
            start,
            removed: count,
            inserted: String::new(),
        }
    }

    pub fn replace(start: usize, removed: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            removed,
            inserted: text.into(),
        }
    }
}

/// What the field looked like just before an edit, and what the edit was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSnapshot {
    pub before: UnvalidatedCardNumber,
    pub start: usize,
    pub removed: usize,
    pub inserted_chars: usize,
    pub inserted_digits: usize,
    pub is_paste: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormattingResult {
    pub formatted_text: String,
    pub cursor_offset: usize,
}

/// Observable state of the field, republished after every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldState {
    pub brand: CardBrand,
    pub is_valid: bool,
    pub should_show_error: bool,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEvent {
    BrandChanged(CardBrand),
    /// The number became complete and valid.
    Completed,
    /// A full, checksum-valid number was entered before its range resolved.
    MetadataLoadedTooSlow,
}

impl fmt::Display for FieldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldEvent::BrandChanged(brand) => write!(f, "brand:{brand}"),
            FieldEvent::Completed => f.write_str("completed"),
            FieldEvent::MetadataLoadedTooSlow => f.write_str("slow_metadata"),
        }
    }
}

/// Where the coordinator is within one edit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Idle,
    EditCaptured,
    Resolving,
    Reformatting,
    /// The coordinator is writing its own formatted text back.
    Rewriting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Edit,
    Resolution,
}

struct PendingRewrite {
    snapshot: EditSnapshot,
    new_text: String,
    number: UnvalidatedCardNumber,
    result: FormattingResult,
}

/// Drives the card number field: turns edits into formatted text and cursor
/// positions, and keeps brand, validity and error display in step with them.
///
/// The coordinator is owned by a single thread. Remote lookups run on the
/// injected runtime and come back as [`ResolverMessage`]s, which the owner
/// applies with [`EditCoordinator::pump`], [`EditCoordinator::next_message`]
/// or [`EditCoordinator::settle`].
pub struct EditCoordinator {
    resolver: AccountRangeResolver,
    table: Arc<StaticRangeTable>,
    messages: mpsc::UnboundedReceiver<ResolverMessage>,
    phase: EditPhase,
    generation: Generation,
    text: String,
    cursor: usize,
    number: UnvalidatedCardNumber,
    length_filter: usize,
    format_length: usize,
    last_edit: Option<EditSnapshot>,
    brand: CardBrand,
    is_valid: bool,
    is_complete: bool,
    should_show_error: bool,
    remote_loading: bool,
    state: watch::Sender<FieldState>,
    events: broadcast::Sender<FieldEvent>,
}

impl EditCoordinator {
    /// Creates a coordinator for an empty field.
    ///
    /// # Arguments
    ///
    /// * `service` - Remote account range lookup.
    /// * `table` - Static ranges used for the fast path and length hints.
    /// * `config` - Brands that always need the remote lookup.
    /// * `runtime` - Where lookups and the loading forwarder run.
    pub fn new(
        service: SharedAccountRangeService,
        table: Arc<StaticRangeTable>,
        config: ResolverConfig,
        runtime: Handle,
    ) -> Self {
        let (sender, messages) = mpsc::unbounded_channel();
        let resolver =
            AccountRangeResolver::new(Arc::clone(&table), service, config, runtime, sender);
        let (state, _) = watch::channel(FieldState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            resolver,
            table,
            messages,
            phase: EditPhase::Idle,
            generation: Generation::default(),
            text: String::new(),
            cursor: 0,
            number: UnvalidatedCardNumber::default(),
            length_filter: formatted_pan_length(DEFAULT_PAN_LENGTH),
            format_length: DEFAULT_PAN_LENGTH,
            last_edit: None,
            brand: CardBrand::Unknown,
            is_valid: false,
            is_complete: false,
            should_show_error: false,
            remote_loading: false,
            state,
            events,
        }
    }

    /// Bundled static table, default configuration, current tokio runtime.
    pub fn with_defaults(service: SharedAccountRangeService) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| CardEntryError::RuntimeError(e.to_string()))?;
        Ok(Self::new(
            service,
            StaticRangeTable::bundled(),
            ResolverConfig::default(),
            runtime,
        ))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> EditPhase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn number(&self) -> &UnvalidatedCardNumber {
        &self.number
    }

    pub fn brand(&self) -> CardBrand {
        self.brand
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn should_show_error(&self) -> bool {
        self.should_show_error
    }

    pub fn is_loading(&self) -> bool {
        self.remote_loading || self.resolver.state().is_pending()
    }

    pub fn resolution(&self) -> &ResolutionState {
        self.resolver.state()
    }

    pub fn account_range(&self) -> Option<&AccountRange> {
        self.resolver.state().account_range()
    }

    /// Maximum formatted length the field currently accepts.
    pub fn length_filter(&self) -> usize {
        self.length_filter
    }

    /// Digit count the last formatting pass grouped for.
    pub fn format_length(&self) -> usize {
        self.format_length
    }

    pub fn last_edit(&self) -> Option<&EditSnapshot> {
        self.last_edit.as_ref()
    }

    /// Resolved range length, else the static hint, else the default.
    pub fn pan_length(&self) -> usize {
        self.pan_length_for(&self.number)
    }

    fn pan_length_for(&self, number: &UnvalidatedCardNumber) -> usize {
        self.resolver
            .state()
            .account_range()
            .map(|range| range.pan_length)
            .or_else(|| self.table.length_hint(number))
            .unwrap_or(DEFAULT_PAN_LENGTH)
    }

    /// Longest PAN the digits could still grow into.
    fn max_pan_length_for(&self, number: &UnvalidatedCardNumber) -> usize {
        let resolved = self.resolver.state().account_range().map(|range| range.pan_length);
        resolved
            .into_iter()
            .chain(self.table.max_pan_length(number))
            .max()
            .unwrap_or(DEFAULT_PAN_LENGTH)
    }

    pub fn validated_card_number(&self) -> Option<ValidatedCardNumber> {
        self.number.validate(self.pan_length())
    }

    /// The normalized number, only while it is valid.
    pub fn card_number(&self) -> Option<String> {
        self.validated_card_number()
            .map(|validated| validated.value().to_string())
    }

    pub fn formatting(&self) -> FormattingResult {
        FormattingResult {
            formatted_text: self.text.clone(),
            cursor_offset: self.cursor,
        }
    }

    pub fn field_state(&self) -> FieldState {
        FieldState {
            brand: self.brand,
            is_valid: self.is_valid,
            should_show_error: self.should_show_error,
            is_loading: self.is_loading(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FieldState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FieldEvent> {
        self.events.subscribe()
    }

    /// Starts following the lookup service's loading stream.
    pub fn attach(&mut self) {
        self.resolver.attach();
    }

    /// Cancels any outstanding lookup and stops following the loading stream.
    pub fn detach(&mut self) {
        let previous = self.resolver.state().account_range().cloned();
        self.resolver.detach();
        self.remote_loading = false;
        let number = self.number.clone();
        self.on_resolution_changed(previous, &number);
        self.publish();
    }

    /// Whole-text entry point: the host reports what the field now contains.
    ///
    /// Text carrying the same digits as the field is treated as an echo of
    /// the field's own formatting and leaves everything unchanged.
    pub fn on_text_changed(&mut self, raw: &str) -> FormattingResult {
        if UnvalidatedCardNumber::new(raw) == self.number {
            return self.formatting();
        }
        let edit = diff(&self.text, raw);
        self.apply_edit(edit)
    }

    /// Runs one complete edit cycle and returns the text and cursor to show.
    pub fn apply_edit(&mut self, edit: TextEdit) -> FormattingResult {
        if self.phase != EditPhase::Idle {
            debug!(phase = ?self.phase, "ignoring edit during an edit cycle");
            return self.formatting();
        }

        let Some(edit) = self.filter_edit(edit) else {
            return self.formatting();
        };

        let snapshot = self.capture(&edit);
        let pending = self.reformat(snapshot, &edit);
        self.rewrite(pending)
    }

    /// Applies the length filter; `None` when nothing of the edit survives.
    fn filter_edit(&self, edit: TextEdit) -> Option<TextEdit> {
        let len = self.text.chars().count();
        let start = edit.start.min(len);
        let removed = edit.removed.min(len - start);

        let keep = self.length_filter.saturating_sub(len - removed);
        let inserted: String = edit.inserted.chars().take(keep).collect();

        if removed == 0 && inserted.is_empty() {
            return None;
        }
        Some(TextEdit {
            start,
            removed,
            inserted,
        })
    }

    fn capture(&mut self, edit: &TextEdit) -> EditSnapshot {
        self.phase = EditPhase::EditCaptured;
        EditSnapshot {
            before: self.number.clone(),
            start: edit.start,
            removed: edit.removed,
            inserted_chars: edit.inserted.chars().count(),
            inserted_digits: edit.inserted.chars().filter(char::is_ascii_digit).count(),
            is_paste: false,
        }
    }

    fn reformat(&mut self, mut snapshot: EditSnapshot, edit: &TextEdit) -> PendingRewrite {
        let new_text = splice(&self.text, edit);
        let number = UnvalidatedCardNumber::new(&new_text);

        self.phase = EditPhase::Resolving;
        self.generation = self.generation.next();
        let previous = self.resolver.state().account_range().cloned();
        self.resolver.resolve(&number, self.generation);
        self.on_resolution_changed(previous, &number);

        self.phase = EditPhase::Reformatting;
        snapshot.is_paste = snapshot.inserted_chars > snapshot.removed
            && snapshot.start == 0
            && number.len() >= MIN_PASTE_LENGTH;

        let max_length = if snapshot.is_paste {
            let pasted = number.len().min(MAX_PAN_LENGTH);
            let pasted_length = number.formatted(pasted).chars().count();
            self.length_filter = self.length_filter.max(pasted_length);
            pasted
        } else {
            self.pan_length_for(&number)
        };
        self.format_length = max_length;

        let formatted_text = number.formatted(max_length);
        let cursor_offset = compute_cursor(
            formatted_text.chars().count(),
            snapshot.start,
            snapshot.inserted_digits,
            max_length,
        );

        PendingRewrite {
            snapshot,
            new_text,
            number,
            result: FormattingResult {
                formatted_text,
                cursor_offset,
            },
        }
    }

    fn rewrite(&mut self, pending: PendingRewrite) -> FormattingResult {
        self.phase = EditPhase::Rewriting;
        let PendingRewrite {
            snapshot,
            new_text,
            number,
            result,
        } = pending;

        // A delete keystroke keeps the text as the user left it. Regrouping it
        // would put back a separator the user just removed.
        let digits_added = number.len() > snapshot.before.len();
        let is_delete = snapshot.inserted_chars == 0 && snapshot.removed > 0;

        if digits_added || !is_delete {
            let len = result.formatted_text.chars().count();
            self.text = result.formatted_text;
            self.cursor = result.cursor_offset.min(len);
        } else {
            self.text = new_text;
            self.cursor = snapshot.start;
        }

        self.number = number;
        self.last_edit = Some(snapshot);
        self.phase = EditPhase::Idle;

        self.evaluate(Trigger::Edit);
        self.formatting()
    }

    /// Recomputes validity, error display and completion for the current digits.
    fn evaluate(&mut self, trigger: Trigger) {
        let pan_length = self.pan_length();
        let validated = self.number.validate(pan_length);
        self.is_valid = validated.is_some();

        if self.number.is_max_length(pan_length) {
            self.should_show_error = !self.is_valid;

            if trigger == Trigger::Edit
                && self.account_range().is_none()
                && self.number.is_valid_luhn()
            {
                info!(
                    generation = self.generation.value(),
                    "card number completed before its account range resolved"
                );
                self.emit(FieldEvent::MetadataLoadedTooSlow);
            }
        } else if trigger == Trigger::Edit {
            // Impossible prefixes fail fast; ambiguous partial input stays quiet.
            self.should_show_error = !self.is_possible_brand();
        }

        // Only a confirmed range completes the number; a failed lookup leaves it unconfirmed.
        let was_complete = self.is_complete;
        self.is_complete = self.account_range().is_some() && self.is_valid;
        if let Some(validated) = validated
            && self.is_complete
            && !was_complete
        {
            info!(brand = %self.brand, last4 = validated.last4(), "card number complete");
            self.emit(FieldEvent::Completed);
        }

        self.publish();
    }

    fn is_possible_brand(&self) -> bool {
        self.table.is_possible_brand(&self.number)
            || self
                .account_range()
                .is_some_and(|range| range.matches(&self.number))
    }

    fn on_resolution_changed(
        &mut self,
        previous: Option<AccountRange>,
        number: &UnvalidatedCardNumber,
    ) {
        let (range_changed, brand) = {
            let current = self.resolver.state().account_range();
            (
                current != previous.as_ref(),
                current.map_or(CardBrand::Unknown, |range| range.brand),
            )
        };

        let allowed = formatted_pan_length(self.max_pan_length_for(number));
        self.length_filter = if range_changed {
            allowed
        } else {
            self.length_filter.max(allowed)
        };

        if brand != self.brand {
            debug!(from = %self.brand, to = %brand, "card brand changed");
            self.brand = brand;
            self.emit(FieldEvent::BrandChanged(brand));
        }
    }

    /// Focus loss on a partial number turns the error on.
    pub fn on_focus_changed(&mut self, has_focus: bool) {
        if !has_focus && self.number.is_partial_entry(self.pan_length()) {
            self.should_show_error = true;
            self.publish();
        }
    }

    /// Applies one message produced off-thread by the resolver.
    pub fn handle_message(&mut self, message: ResolverMessage) {
        match message {
            ResolverMessage::Loading(loading) => {
                if self.resolver.is_attached() {
                    self.remote_loading = loading;
                    self.publish();
                }
            }
            ResolverMessage::Resolved(resolution) => {
                if resolution.generation != self.generation {
                    debug!(
                        generation = resolution.generation.value(),
                        current = self.generation.value(),
                        "dropping account range for a superseded edit"
                    );
                    return;
                }

                let previous = self.resolver.state().account_range().cloned();
                if self.resolver.apply_remote(resolution).is_some() {
                    let number = self.number.clone();
                    self.on_resolution_changed(previous, &number);
                    self.evaluate(Trigger::Resolution);
                }
            }
        }
    }

    /// Applies every message already delivered. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.messages.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Waits for the next message and applies it.
    pub async fn next_message(&mut self) -> bool {
        match self.messages.recv().await {
            Some(message) => {
                self.handle_message(message);
                true
            }
            None => false,
        }
    }

    /// Waits until no lookup is outstanding.
    pub async fn settle(&mut self) {
        while self.resolver.state().is_pending() {
            if !self.next_message().await {
                break;
            }
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.field_state());
    }

    fn emit(&self, event: FieldEvent) {
        // No subscribers is fine.
        self.events.send(event).ok();
    }
}

fn splice(text: &str, edit: &TextEdit) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    chars.splice(edit.start..edit.start + edit.removed, edit.inserted.chars());
    chars.into_iter().collect()
}

/// Smallest single edit turning `old` into `new`.
fn diff(old: &str, new: &str) -> TextEdit {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    TextEdit {
        start: prefix,
        removed: old.len() - prefix - suffix,
        inserted: new[prefix..new.len() - suffix].iter().collect(),
    }
}
