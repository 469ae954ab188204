//! Driver facade end to end: bring-up, rate-limited sends, reply
//! handling and the staleness watchdog.

use actuator_link::app::ports::Direction;
use actuator_link::error::{ConfigError, Error, FrameError, LinkError};
use actuator_link::link::connection::LinkState;
use actuator_link::link::framer::MessageKind;
use actuator_link::{ModemDriver, StepOutcome};

use crate::mock_modem::{RecordingSink, ScriptedModem, SimClock, test_config};

type TestDriver = ModemDriver<ScriptedModem, SimClock>;

const REPLY: &str = "\r\nRecv 12 bytes\r\n\r\nSEND OK\r\n\r\n+IPD,0,13:cmd:42.6000;;\r\n";

fn started(modem: &ScriptedModem) -> (TestDriver, SimClock) {
    let clock = SimClock::new();
    let mut driver = ModemDriver::new(modem.clone(), clock.clone(), test_config()).unwrap();
    driver.configure().unwrap();
    (driver, clock)
}

#[test]
fn new_rejects_invalid_config() {
    let mut cfg = test_config();
    cfg.send_frequency_hz = 0;
    let result = ModemDriver::new(ScriptedModem::new(), SimClock::new(), cfg);
    assert!(matches!(result, Err(Error::Config(ConfigError::InvalidFrequency))));
}

#[test]
fn modem_traffic_is_mirrored_to_diagnostics() {
    let modem = ScriptedModem::healthy();
    let sink = RecordingSink::new();
    let mut driver =
        ModemDriver::with_diagnostics(modem.clone(), SimClock::new(), sink.clone(), test_config())
            .unwrap();
    driver.configure().unwrap();

    let entries = sink.entries();
    // Reset reply, then the banner is flushed without being mirrored.
    assert_eq!(
        entries[..4],
        [
            (Direction::Request, "AT+RST\r\n".to_string()),
            (Direction::Response, "\r\n".to_string()),
            (Direction::Response, "OK\r\n".to_string()),
            (Direction::Request, "AT+CWMODE=1\r\n".to_string()),
        ]
    );
    let requests: Vec<&str> = entries
        .iter()
        .filter(|(d, _)| *d == Direction::Request)
        .map(|(_, text)| text.as_str())
        .collect();
    assert_eq!(requests.len(), 4);
    assert!(entries.contains(&(Direction::Response, "WIFI GOT IP\r\n".to_string())));
    assert!(!entries.iter().any(|(_, text)| text.contains("ready")));
}

#[test]
fn step_sends_setpoint_and_stores_reply() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, _) = started(&modem);
    modem.clear_writes();

    assert_eq!(driver.step("3", 42.5), StepOutcome::Replied);

    let writes = modem.writes();
    assert!(writes[0].starts_with("AT+CIPSTART=0,"));
    assert_eq!(writes[1], "AT+CIPSEND=0,12\r\n");
    assert_eq!(writes[2], "3:42.5000;\r\n");
    assert!(driver.is_open());
    assert_eq!(driver.state(), LinkState::SocketOpen);
    assert_eq!(driver.last_message(), "42.6000");
    assert_eq!(driver.last_message_kind(), Some(MessageKind::Command));
    assert_eq!(driver.last_request(), "3:42.5000;\r\n");
    assert!(driver.last_received_at().is_some());
}

#[test]
fn sends_are_rate_limited() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);

    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Skipped);

    // 20 Hz: one send per 50 ms.
    clock.advance(60);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(modem.count("3:"), 2);
}

#[test]
fn reset_send_timer_forces_next_send() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, _) = started(&modem);

    driver.step("3", 1.0);
    driver.reset_send_timer();
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(modem.count("3:"), 2);
}

#[test]
fn command_timeout_override_bounds_the_wait() {
    let modem = ScriptedModem::healthy();
    let (mut driver, clock) = started(&modem);
    driver.step("3", 1.0);
    assert!(driver.connectivity().socket_open);

    driver.set_command_timeout(20);
    clock.advance(60);
    let before = clock.peek();
    assert_eq!(driver.step("3", 1.0), StepOutcome::NoReply);
    // Length declaration plus a silent payload phase, each capped at 20 ms.
    assert!(clock.peek() - before < 100);
}

#[test]
fn missing_reply_keeps_last_message() {
    let modem = ScriptedModem::healthy();
    modem.respond_once("3:", REPLY);
    let (mut driver, clock) = started(&modem);

    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    let received = driver.last_received_at();

    clock.advance(60);
    assert_eq!(driver.step("3", 1.0), StepOutcome::NoReply);
    assert_eq!(driver.last_message(), "42.6000");
    assert_eq!(driver.last_received_at(), received);
}

#[test]
fn no_change_refreshes_timestamp_only() {
    let modem = ScriptedModem::healthy();
    modem.respond_once("3:", REPLY);
    modem.respond("3:", "\r\nSEND OK\r\n\r\n+IPD,0,8:cmd:nc;;\r\n");
    let (mut driver, clock) = started(&modem);

    driver.step("3", 1.0);
    let first = driver.last_received_at().unwrap();

    clock.advance(60);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(driver.last_message(), "42.6000");
    assert!(driver.last_received_at().unwrap() > first);
}

#[test]
fn send_failure_retries_on_next_step() {
    let modem = ScriptedModem::healthy();
    modem.respond_once("3:", "\r\nSEND FAIL\r\n");
    modem.respond("3:", REPLY);
    let (mut driver, _) = started(&modem);

    assert_eq!(
        driver.step("3", 1.0),
        StepOutcome::Failed(Error::Link(LinkError::Rejected))
    );
    // Send timer was cleared: no waiting for the interval.
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
}

#[test]
fn rejected_length_declaration_fails_step() {
    let modem = ScriptedModem::healthy();
    modem.respond("AT+CIPSEND", "\r\nERROR\r\n");
    let (mut driver, _) = started(&modem);

    assert_eq!(
        driver.step("3", 1.0),
        StepOutcome::Failed(Error::Link(LinkError::Rejected))
    );
    assert_eq!(modem.count("3:"), 0);
}

#[test]
fn actuator_config_is_attached_once() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);

    driver.set_actuator_config("kp=1.5").unwrap();
    driver.step("3", 2.0);
    assert_eq!(driver.last_request(), "3:2.0000;kp=1.5\r\n");
    assert_eq!(modem.count("AT+CIPSEND=0,17"), 1);

    clock.advance(60);
    driver.step("3", 2.0);
    assert_eq!(driver.last_request(), "3:2.0000;\r\n");
}

#[test]
fn oversized_actuator_config_is_refused() {
    let modem = ScriptedModem::healthy();
    let (mut driver, _) = started(&modem);

    let long = "x".repeat(200);
    assert_eq!(
        driver.set_actuator_config(&long),
        Err(Error::Frame(FrameError::SuffixTooLong))
    );
}

#[test]
fn config_request_stores_config_reply() {
    let modem = ScriptedModem::healthy();
    modem.respond("1:?;", "\r\nSEND OK\r\n\r\n+IPD,0,14:cfg:mode=2;;\r\n");
    let (mut driver, _) = started(&modem);

    assert_eq!(driver.request_config(1), StepOutcome::Replied);
    assert_eq!(modem.count("AT+CIPSEND=0,6"), 1);
    assert_eq!(driver.last_message(), "mode=2");
    assert_eq!(driver.last_message_kind(), Some(MessageKind::Config));
}

#[test]
fn unsolicited_message_is_drained() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, _) = started(&modem);

    driver.step("3", 1.0);
    modem.push_rx("+IPD,0,13:cmd:12.0000;;\r\n");
    assert_eq!(driver.step("3", 1.0), StepOutcome::Skipped);
    assert_eq!(driver.last_message(), "12.0000");
}

#[test]
fn dropped_socket_is_reopened() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);

    driver.step("3", 1.0);
    modem.push_rx("0,CLOSED\r\n");
    clock.advance(60);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(modem.count("AT+CIPSTART"), 2);
}

#[test]
fn close_sends_cipclose() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, _) = started(&modem);

    driver.step("3", 1.0);
    assert_eq!(driver.close(), Ok(()));
    assert!(!driver.is_open());
    assert_eq!(modem.count("AT+CIPCLOSE=0"), 1);
}

// ── Staleness watchdog ────────────────────────────────────────

#[test]
fn stale_link_is_reconfigured() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);
    assert_eq!(modem.count("AT+RST"), 1);

    clock.advance(3500);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert_eq!(driver.reconnects(), 1);
    assert_eq!(modem.count("AT+RST"), 2);
}

#[test]
fn reconnect_restarts_the_window() {
    // Host never answers: no application data at all.
    let modem = ScriptedModem::healthy();
    let (mut driver, clock) = started(&modem);

    clock.advance(3500);
    driver.step("3", 1.0);
    assert_eq!(driver.reconnects(), 1);

    // Well inside the fresh window: no second reconnect.
    clock.advance(500);
    driver.step("3", 1.0);
    assert_eq!(driver.reconnects(), 1);
}

#[test]
fn failed_reconfigure_rejoins_once_network_returns() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);

    modem.respond("AT+CWJAP", "+CWJAP:3\r\n\r\nFAIL\r\n");
    clock.advance(3500);
    assert_eq!(
        driver.step("3", 1.0),
        StepOutcome::Failed(Error::Link(LinkError::AssociationFailed))
    );
    assert_eq!(driver.reconnects(), 1);
    assert_eq!(driver.state(), LinkState::Disconnected);
    assert!(!driver.connectivity().network_joined);

    modem.respond("AT+CWJAP", "WIFI CONNECTED\r\n\r\nOK\r\n");
    modem.clear_writes();
    clock.advance(60);
    assert_eq!(driver.step("3", 1.0), StepOutcome::Replied);
    assert!(modem.writes()[0].starts_with("AT+CWJAP="));
    assert_eq!(driver.reconnects(), 1);
    assert!(driver.is_open());
}

#[test]
fn fresh_data_holds_off_watchdog() {
    let modem = ScriptedModem::healthy();
    modem.respond("3:", REPLY);
    let (mut driver, clock) = started(&modem);

    for _ in 0..10 {
        clock.advance(1000);
        driver.step("3", 1.0);
    }
    assert_eq!(driver.reconnects(), 0);
}

// ── Node identity ─────────────────────────────────────────────

#[test]
fn node_id_rotates_over_configured_range() {
    let modem = ScriptedModem::healthy();
    let (mut driver, _) = started(&modem);

    assert_eq!(driver.node_id().get(), 0);
    let ids: Vec<u8> = (0..5).map(|_| driver.advance_node_id()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 0]);
}
