// tests/types.rs

use std::time::Duration;

use nodevisor::types::{classify_exit, parse_duration, ExitClass, ExitCode, Signal};

#[test]
fn signals_parse_by_name_and_number() {
    assert_eq!("TERM".parse::<Signal>().unwrap(), Signal::Term);
    assert_eq!("sigkill".parse::<Signal>().unwrap(), Signal::Kill);
    assert_eq!("3".parse::<Signal>().unwrap(), Signal::Quit);
    assert_eq!("NULL".parse::<Signal>().unwrap(), Signal::Null);
    assert!("HUP".parse::<Signal>().is_err());
    assert_eq!(Signal::Kill.number(), 9);
}

#[test]
fn exit_codes_match_signal_convention() {
    assert_eq!(ExitCode::ForceKilled.code(), 128 + Signal::Kill.number());
    assert_eq!(ExitCode::Terminated.code(), 128 + Signal::Term.number());
    assert_eq!(ExitCode::Lost.code(), 154);
}

#[test]
fn exits_are_classified() {
    assert_eq!(classify_exit(0), ExitClass::Success);
    assert_eq!(classify_exit(137), ExitClass::KilledOnRequest);
    assert_eq!(classify_exit(143), ExitClass::KilledOnRequest);
    assert_eq!(classify_exit(1), ExitClass::Failed);
    assert_eq!(classify_exit(154), ExitClass::Failed);
}

#[test]
fn durations_parse() {
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("5").is_err());
    assert!(parse_duration("5d").is_err());
    assert!(parse_duration(&format!("{}h", u64::MAX)).is_err());
    assert!(parse_duration(&format!("{}m", u64::MAX / 30)).is_err());
    assert_eq!(
        parse_duration(&format!("{}s", u64::MAX)).unwrap(),
        Duration::from_secs(u64::MAX)
    );
}
