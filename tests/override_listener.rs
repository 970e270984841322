use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tea_timer::listener::{KeyTransition, OverrideEvent, OverrideHook, OverrideKey, OverrideListener};

const ALT_L: u32 = 0xA4;

fn listener_with_wake_counter() -> (OverrideListener, Arc<AtomicUsize>) {
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wakes);
    let listener = OverrideListener::new(
        OverrideKey::LeftAlt,
        Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );
    (listener, wakes)
}

#[test]
fn held_key_yields_one_press_and_one_release() {
    let (mut listener, wakes) = listener_with_wake_counter();
    listener.start().unwrap();
    listener.process_test_events(&[
        KeyTransition::Down(ALT_L),
        KeyTransition::Down(ALT_L),
        KeyTransition::Down(ALT_L),
        KeyTransition::Up(ALT_L),
    ]);
    assert_eq!(
        listener.drain_events(),
        vec![OverrideEvent::Pressed, OverrideEvent::Released]
    );
    assert_eq!(wakes.load(Ordering::SeqCst), 2);
    assert!(listener.drain_events().is_empty());
    listener.stop();
}

#[test]
fn releases_are_dropped_once_expired() {
    let (mut listener, _) = listener_with_wake_counter();
    listener.start().unwrap();
    listener.process_test_events(&[KeyTransition::Down(ALT_L)]);
    listener.mark_expired();
    listener.process_test_events(&[KeyTransition::Up(ALT_L)]);
    assert_eq!(listener.drain_events(), vec![OverrideEvent::Pressed]);
    listener.stop();
}

#[test]
fn configured_key_replaces_left_alt() {
    let mut listener = OverrideListener::new(OverrideKey::RightCtrl, None);
    listener.start().unwrap();
    listener.process_test_events(&[KeyTransition::Down(ALT_L), KeyTransition::Down(0xA3)]);
    assert_eq!(listener.drain_events(), vec![OverrideEvent::Pressed]);
    assert_eq!(listener.key(), OverrideKey::RightCtrl);
}

#[test]
fn stop_is_idempotent_and_discards_the_queue() {
    let (mut listener, _) = listener_with_wake_counter();
    listener.start().unwrap();
    assert!(listener.is_running());
    listener.process_test_events(&[KeyTransition::Down(ALT_L)]);
    listener.stop();
    listener.stop();
    assert!(!listener.is_running());
    assert!(listener.drain_events().is_empty());
    listener.process_test_events(&[KeyTransition::Up(ALT_L)]);
    assert!(listener.drain_events().is_empty());
}

#[test]
fn events_before_start_are_not_observed() {
    let (mut listener, wakes) = listener_with_wake_counter();
    listener.process_test_events(&[KeyTransition::Down(ALT_L)]);
    assert!(listener.drain_events().is_empty());
    assert_eq!(wakes.load(Ordering::SeqCst), 0);
}
