use super::edit_reader::{EditAction, EditCommand};
use super::state_writer::StateRecord;
use crate::application::coordinator::{EditCoordinator, FieldEvent, TextEdit};
use tokio::sync::broadcast;

/// Plays script commands against one field, reporting its state after each.
pub struct ReplaySession<'a> {
    field: &'a mut EditCoordinator,
    events: broadcast::Receiver<FieldEvent>,
    step: usize,
}

impl<'a> ReplaySession<'a> {
    pub fn new(field: &'a mut EditCoordinator) -> Self {
        let events = field.subscribe_events();
        Self {
            field,
            events,
            step: 0,
        }
    }

    pub async fn step(&mut self, command: &EditCommand) -> StateRecord {
        self.step += 1;
        self.apply(command).await;
        self.field.pump();

        let mut fired = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            fired.push(event.to_string());
        }

        let state = self.field.field_state();
        StateRecord {
            step: self.step,
            action: command.action,
            text: self.field.text().to_string(),
            cursor: self.field.cursor(),
            brand: state.brand,
            valid: state.is_valid,
            error: state.should_show_error,
            loading: state.is_loading,
            events: fired.join(";"),
        }
    }

    async fn apply(&mut self, command: &EditCommand) {
        let text = command.text.as_deref().unwrap_or_default();
        match command.action {
            EditAction::Type => {
                for ch in text.chars() {
                    let at = self.field.cursor();
                    self.field.apply_edit(TextEdit::insert(at, ch.to_string()));
                    self.field.pump();
                }
            }
            EditAction::Backspace => {
                for _ in 0..command.removed.unwrap_or(1) {
                    let at = self.field.cursor();
                    if at == 0 {
                        break;
                    }
                    self.field.apply_edit(TextEdit::delete(at - 1, 1));
                    self.field.pump();
                }
            }
            EditAction::Edit => {
                let start = command.start.unwrap_or(self.field.cursor());
                let removed = command.removed.unwrap_or(0);
                self.field
                    .apply_edit(TextEdit::replace(start, removed, text));
            }
            EditAction::Replace => {
                self.field.on_text_changed(text);
            }
            EditAction::Settle => self.field.settle().await,
            EditAction::Blur => self.field.on_focus_changed(false),
            EditAction::Focus => self.field.on_focus_changed(true),
        }
    }
}
