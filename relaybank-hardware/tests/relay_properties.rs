//! Behavioural tests for both relay drivers against simulated boards

use relaybank_core::{daenet_relay_oid, RelayError, RelayState};
use relaybank_hardware::mock::{exchanges_overlap, MockDaenetBoard, MockUdinBoard, MockUdinDevice};
use relaybank_hardware::{DaenetController, RelayBank, SerialDriver, UdinController};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::io::Builder;

fn udin(board: &MockUdinBoard) -> UdinController<MockUdinDevice> {
    let board = board.clone();
    UdinController::new(Box::new(move || Ok(board.connect())))
}

async fn ready_udin(board: &MockUdinBoard) -> UdinController<MockUdinDevice> {
    let controller = udin(board);
    assert_eq!(controller.initialize().await.unwrap(), 8);
    controller
}

#[tokio::test]
async fn repeated_write_sends_one_switch_command() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    controller.set_relay(4, RelayState::On).await.unwrap();
    controller.set_relay(4, RelayState::On).await.unwrap();

    assert_eq!(board.switch_commands(), vec!["n5"]);
    assert_eq!(controller.get_relay(4).await.unwrap().state, RelayState::On);
}

#[tokio::test]
async fn write_matching_initial_state_sends_nothing() {
    let board = MockUdinBoard::udin_8r();
    board.set_relays(0b1);
    let controller = ready_udin(&board).await;

    controller.set_relay(0, RelayState::On).await.unwrap();
    controller.set_relay(1, RelayState::Off).await.unwrap();

    assert!(board.switch_commands().is_empty());
}

#[tokio::test]
async fn write_then_read_returns_written_state() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    for channel in 0..8 {
        let state = RelayState::from(channel % 2 == 0);
        controller.set_relay(channel, state).await.unwrap();
    }
    for channel in 0..8 {
        assert_eq!(
            controller.get_relay(channel).await.unwrap().state,
            RelayState::from(channel % 2 == 0)
        );
    }
    assert_eq!(board.relays(), 0b0101_0101);
    assert_eq!(controller.relay_count(), 8);
}

#[tokio::test]
async fn write_updates_modification_time() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    let before = controller.get_relay(2).await.unwrap().modified;
    tokio::time::sleep(Duration::from_millis(5)).await;
    controller.set_relay(2, RelayState::On).await.unwrap();
    let after = controller.get_relay(2).await.unwrap().modified;

    assert!(after > before);
}

#[tokio::test]
async fn divergent_device_hides_all_relays() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    // Relay 3 reports on although nobody switched it
    board.set_state_fault(0b100);
    controller.set_relay(0, RelayState::On).await.unwrap();

    assert_eq!(controller.relay_count(), 0);
    assert!(matches!(
        controller.get_relay(0).await,
        Err(RelayError::InvalidChannel { channel: 0, count: 0 })
    ));

    let before = board.sent_commands().len();
    assert!(controller.set_relay(1, RelayState::On).await.is_err());
    assert_eq!(board.sent_commands().len(), before);
}

#[tokio::test]
async fn device_disagreeing_with_written_bit_hides_all_relays() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    // Relay 1 switches but the board keeps reporting it off
    board.set_state_fault(0b1);
    controller.set_relay(0, RelayState::On).await.unwrap();

    assert_eq!(board.relays(), 0b1);
    assert_eq!(controller.relay_count(), 0);
    assert!(controller.get_relay(0).await.is_err());
}

#[tokio::test]
async fn lost_switch_reply_is_not_a_cache_hit_later() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    board.drop_replies(1);
    assert!(controller.set_relay(0, RelayState::On).await.is_err());
    assert_eq!(board.relays(), 0b1);
    assert_eq!(controller.relay_count(), 0);

    // Nothing reports success while the relay sits in the other position
    assert!(controller.set_relay(0, RelayState::Off).await.is_err());
    assert_eq!(board.switch_commands(), vec!["n1"]);

    assert_eq!(controller.initialize().await.unwrap(), 8);
    controller.set_relay(0, RelayState::Off).await.unwrap();
    assert_eq!(board.relays(), 0);
}

#[tokio::test]
async fn reinitialize_recovers_from_divergence() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;

    board.set_state_fault(0b1000_0000);
    controller.set_relay(0, RelayState::On).await.unwrap();
    assert_eq!(controller.relay_count(), 0);

    board.set_state_fault(0);
    assert_eq!(RelayBank::reinitialize(&controller).await.unwrap(), 8);

    assert_eq!(controller.get_relay(0).await.unwrap().state, RelayState::On);
    assert_eq!(controller.get_relay(7).await.unwrap().state, RelayState::Off);
}

#[tokio::test]
async fn unknown_identity_is_treated_as_absent() {
    let board = MockUdinBoard::new("UDIN-4R 4 x Relay V2.1");
    let controller = udin(&board);

    let err = controller.initialize().await.unwrap_err();
    assert!(matches!(err, RelayError::UnsupportedDevice(ref id) if id == "UDIN-4R 4 x Relay V2.1"));
    assert_eq!(controller.relay_count(), 0);

    assert!(controller.set_relay(0, RelayState::On).await.is_err());
    assert!(controller.get_relay(0).await.is_err());
    assert_eq!(board.sent_commands(), vec!["?"]);
}

#[tokio::test]
async fn silent_device_fails_identification() {
    let board = MockUdinBoard::udin_8r();
    board.set_silent(true);
    let controller = udin(&board);

    assert!(matches!(
        controller.initialize().await,
        Err(RelayError::Timeout(_))
    ));
    assert_eq!(controller.relay_count(), 0);
}

#[tokio::test]
async fn unplugged_device_closes_port() {
    let controller = UdinController::new(Box::new(|| {
        let port = Builder::new()
            .write(b"?\r")
            .read(b"?\r\nUDIN-8R 8 x Relay V1.0\r\n")
            .write(b"s0\r")
            .read(b"s0\r\n")
            .read(b"0\r\n")
            .write(b"n1\r")
            .build();
        Ok(Box::new(SerialDriver::with_port(port, "/dev/ttyUSB0", false)))
    }));

    assert_eq!(controller.initialize().await.unwrap(), 8);

    let err = controller.set_relay(0, RelayState::On).await.unwrap_err();
    assert!(matches!(err, RelayError::DeviceDisconnected(_)));
    assert_eq!(controller.relay_count(), 0);
}

#[tokio::test]
async fn out_of_range_channels_never_reach_the_wire() {
    let board = MockUdinBoard::udin_8r();
    let controller = ready_udin(&board).await;
    let before = board.sent_commands().len();

    assert!(matches!(
        controller.set_relay(8, RelayState::On).await,
        Err(RelayError::InvalidChannel { channel: 8, count: 8 })
    ));
    assert!(controller.get_relay(100).await.is_err());
    assert_eq!(board.sent_commands().len(), before);

    let snmp = MockDaenetBoard::new();
    let daenet = DaenetController::new(snmp.session(), 16);
    assert!(daenet.get_relay(16).await.is_err());
    assert!(snmp.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_udin_operations_do_not_interleave() {
    let board = MockUdinBoard::udin_8r();
    board.set_latency(Duration::from_millis(2));
    let controller = Arc::new(ready_udin(&board).await);

    let mut tasks = Vec::new();
    for channel in 0..8 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move {
            controller.set_relay(channel, RelayState::On).await.unwrap();
            controller.get_relay(channel).await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().state, RelayState::On);
    }

    let exchanges = board.exchanges();
    assert!(exchanges.len() >= 2 + 16);
    assert!(!exchanges_overlap(&exchanges));

    // Each switch and its verification read form one section
    let commands = board.sent_commands();
    assert_eq!(&commands[..2], ["?", "s0"]);
    for pair in commands[2..].chunks(2) {
        assert!(pair[0].starts_with('n'), "{:?}", commands);
        assert_eq!(pair[1], "s0", "{:?}", commands);
    }
    assert_eq!(commands.len(), 2 + 16);
    assert_eq!(board.relays(), 0xFF);
    assert_eq!(controller.relay_count(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_snmp_requests_do_not_interleave() {
    let board = MockDaenetBoard::new();
    board.set_latency(Duration::from_millis(2));
    let controller = Arc::new(DaenetController::new(board.session(), 16));

    let mut tasks = Vec::new();
    for channel in 0..16 {
        let controller = controller.clone();
        tasks.push(tokio::spawn(async move {
            controller.set_relay(channel, RelayState::On).await.unwrap();
            controller.get_relay(channel).await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), RelayState::On);
    }

    let exchanges = board.exchanges();
    assert_eq!(exchanges.len(), 32);
    assert!(!exchanges_overlap(&exchanges));
    for channel in 0..16 {
        assert_eq!(board.value(&daenet_relay_oid(channel)), Some(1));
    }
}

#[tokio::test]
async fn snmp_reads_are_live() {
    let board = MockDaenetBoard::new();
    let controller = DaenetController::new(board.session(), 8);

    assert_eq!(controller.get_relay(5).await.unwrap(), RelayState::Off);
    board.set_value(daenet_relay_oid(5), 1);
    assert_eq!(controller.get_relay(5).await.unwrap(), RelayState::On);
}

#[tokio::test]
async fn unreachable_agent_is_an_io_error() {
    let board = MockDaenetBoard::new();
    board.set_unreachable(true);
    let controller = DaenetController::new(board.session(), 8);

    let err = controller.set_relay(0, RelayState::On).await.unwrap_err();
    assert!(err.is_io_class());
    assert_eq!(controller.relay_count(), 8);
}
