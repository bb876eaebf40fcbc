use guest_pdk::mock::MockHost;
use guest_pdk::{run_plugin, Host, EXIT_FAILURE, EXIT_SUCCESS};
use hello_plugin::{greet, GreeterConfig, COUNT_VAR};
use log::Level;

fn invoke(mock: &MockHost) -> i32 {
    run_plugin(&Host::new(mock), greet)
}

#[test]
fn greets_plain_text_input() {
    let mock = MockHost::with_input(b"World");

    assert_eq!(invoke(&mock), EXIT_SUCCESS);
    assert_eq!(mock.output(), Some(b"Hello, World!".to_vec()));
    assert_eq!(mock.error(), None);
    assert_eq!(mock.live_allocations(), 0);
    assert!(mock.violations().is_empty());
}

#[test]
fn empty_input_greets_world() {
    let mock = MockHost::new();

    assert_eq!(invoke(&mock), EXIT_SUCCESS);
    assert_eq!(mock.output_string().as_deref(), Some("Hello, World!"));
}

#[test]
fn json_input_and_configured_greeting() {
    let mock = MockHost::with_input(br#"{"name": "Ada"}"#);
    mock.set_config("greeting", "Howdy");

    assert_eq!(invoke(&mock), EXIT_SUCCESS);
    assert_eq!(mock.output_string().as_deref(), Some("Howdy, Ada!"));
}

#[test]
fn config_defaults_when_unset() {
    let mock = MockHost::new();
    assert_eq!(GreeterConfig::load(&Host::new(&mock)), GreeterConfig::default());
}

#[test]
fn invocation_counter_persists_in_host_vars() {
    let mock = MockHost::with_input(b"Ada");

    invoke(&mock);
    invoke(&mock);
    assert_eq!(invoke(&mock), EXIT_SUCCESS);

    assert_eq!(mock.var_value(COUNT_VAR), Some(b"3".to_vec()));
    assert!(mock
        .logs()
        .contains(&(Level::Info, "Created greeting #3: Hello, Ada!".to_string())));
}

#[test]
fn rejected_counter_write_only_warns() {
    let mock = MockHost::with_input(b"Ada");
    mock.reject_var_writes(true);

    assert_eq!(invoke(&mock), EXIT_SUCCESS);
    assert_eq!(mock.output_string().as_deref(), Some("Hello, Ada!"));
    assert!(mock.logs().contains(&(
        Level::Warn,
        "host rejected invocation counter update".to_string()
    )));
}

#[test]
fn non_utf8_input_is_reported_on_error_channel() {
    let mock = MockHost::with_input(&[0xc3, 0x28]);

    assert_eq!(invoke(&mock), EXIT_FAILURE);
    assert_eq!(mock.output(), None);
    let error = mock.error().unwrap();
    assert!(error.starts_with("failed to read input"), "{}", error);
    assert_eq!(mock.var_value(COUNT_VAR), None);
    assert_eq!(mock.live_allocations(), 0);
}

#[test]
fn saturated_counter_stays_at_maximum() {
    let mock = MockHost::with_input(b"Ada");
    mock.insert_var(COUNT_VAR, u64::MAX.to_string());

    assert_eq!(invoke(&mock), EXIT_SUCCESS);
    assert_eq!(
        mock.var_value(COUNT_VAR),
        Some(u64::MAX.to_string().into_bytes())
    );
}
