mod common;

use card_entry::application::coordinator::{FieldEvent, TextEdit};
use card_entry::domain::brand::CardBrand;
use common::{GatedAccountRangeService, bundled_service, drain_events, field_with};
use std::sync::Arc;

#[tokio::test]
async fn test_paste_into_empty_field() {
    let mut field = field_with(Arc::new(bundled_service()));
    let mut events = field.subscribe_events();

    let result = field.on_text_changed("4242424242424242");
    assert_eq!(result.formatted_text, "4242 4242 4242 4242");
    assert_eq!(result.cursor_offset, 19);
    assert_eq!(field.format_length(), 16);
    assert!(field.last_edit().is_some_and(|edit| edit.is_paste));
    assert!(field.is_valid());
    assert_eq!(
        drain_events(&mut events),
        vec![FieldEvent::BrandChanged(CardBrand::Visa), FieldEvent::Completed]
    );
}

#[tokio::test]
async fn test_repeated_paste_is_idempotent() {
    let mut field = field_with(Arc::new(bundled_service()));
    let mut events = field.subscribe_events();

    let first = field.on_text_changed("4242424242424242");
    let generation = field.generation();
    drain_events(&mut events);

    let second = field.on_text_changed("4242424242424242");
    assert_eq!(first, second);
    assert_eq!(field.generation(), generation);
    assert!(drain_events(&mut events).is_empty());

    // The host echoing the formatted text back is a no-op too.
    let echoed = field.on_text_changed("4242 4242 4242 4242");
    assert_eq!(echoed, first);
}

#[tokio::test]
async fn test_paste_with_separators() {
    let mut field = field_with(Arc::new(bundled_service()));

    let result = field.on_text_changed("3782-822463-10005");
    assert_eq!(result.formatted_text, "3782 822463 10005");
    assert_eq!(result.cursor_offset, 17);
    assert_eq!(field.brand(), CardBrand::AmericanExpress);
    assert!(field.is_valid());
}

#[tokio::test]
async fn test_short_insert_is_not_a_paste() {
    let mut field = field_with(Arc::new(bundled_service()));

    field.on_text_changed("4242");
    assert!(field.last_edit().is_some_and(|edit| !edit.is_paste));

    // Long insertions away from the start are not pastes either.
    field.apply_edit(TextEdit::insert(4, "42424242"));
    assert!(field.last_edit().is_some_and(|edit| !edit.is_paste));
    assert_eq!(field.text(), "4242 4242 4242");
}

#[tokio::test]
async fn test_paste_of_long_number_widens_length_filter() {
    let service = GatedAccountRangeService::new();
    let mut field = field_with(Arc::new(service.clone()));

    let result = field.on_text_changed("6200000000000000000");
    assert_eq!(result.formatted_text, "6200 0000 0000 0000 000");
    assert_eq!(result.cursor_offset, 23);
    assert_eq!(field.format_length(), 19);
    assert_eq!(field.length_filter(), 23);
    assert!(field.is_loading());

    service.release(1);
    field.settle().await;
    assert_eq!(field.brand(), CardBrand::UnionPay);
    assert_eq!(field.pan_length(), 19);
    assert_eq!(field.length_filter(), 23);
    assert!(field.is_valid());
    assert_eq!(field.card_number().as_deref(), Some("6200000000000000000"));
}

#[tokio::test]
async fn test_paste_replacing_existing_text() {
    let mut field = field_with(Arc::new(bundled_service()));

    field.on_text_changed("3782");
    assert_eq!(field.brand(), CardBrand::AmericanExpress);

    let result = field.apply_edit(TextEdit::replace(0, 4, "5555555555554444"));
    assert_eq!(result.formatted_text, "5555 5555 5555 4444");
    assert_eq!(field.brand(), CardBrand::MasterCard);
    assert!(field.last_edit().is_some_and(|edit| edit.is_paste));
    assert!(field.is_valid());
}
