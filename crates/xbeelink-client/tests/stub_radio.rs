use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use xbeelink_client::{
    spawn, Client, ClientConfig, ClientError, Delivery, InboundQueue, OverflowPolicy, Pin,
    PinMode, DISPATCH_THREAD_NAME,
};
use xbeelink_frame::memory::{self, MemorySink};
use xbeelink_frame::{Address, AtCommand, Frame, FrameSink, FrameSource, FrameType};

struct Radio {
    client: Arc<Client<MemorySink>>,
    inject: MemorySink,
    seen: Arc<Mutex<Vec<Frame>>>,
    dispatch: JoinHandle<()>,
}

impl Radio {
    fn seen(&self) -> Vec<Frame> {
        self.seen.lock().expect("seen lock").clone()
    }

    fn inject(&mut self, frame: Frame) {
        self.inject
            .write_frame(&frame)
            .expect("dispatcher should be reading");
    }
}

/// Start a client wired to a simulated module that answers each request
/// with whatever `handler` returns.
fn start<F>(config: ClientConfig, mut handler: F) -> Radio
where
    F: FnMut(&Frame) -> Vec<Frame> + Send + 'static,
{
    let (request_sink, mut requests) = memory::channel();
    let (response_sink, responses) = memory::channel();
    let (client, dispatch) =
        spawn(responses, request_sink, config).expect("dispatch thread should start");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let mut out = response_sink.clone();
    thread::spawn(move || {
        while let Ok(frame) = requests.read_frame() {
            log.lock().expect("seen lock").push(frame.clone());
            for reply in handler(&frame) {
                if out.write_frame(&reply).is_err() {
                    return;
                }
            }
        }
    });

    Radio {
        client: Arc::new(client),
        inject: response_sink,
        seen,
        dispatch,
    }
}

fn reply(request: &Frame, status: u8, value: &[u8]) -> Frame {
    let id = request.frame_id().expect("request should carry a frame id");
    match request.at_command_parts() {
        Some((command, _)) => Frame::at_command_response(id, command, status, value),
        None => Frame::tx_status(id, status),
    }
}

/// AT registers that read back whatever was last written.
fn echo_registers() -> impl FnMut(&Frame) -> Vec<Frame> + Send + 'static {
    let mut registers: HashMap<AtCommand, Vec<u8>> = HashMap::new();
    move |frame| match frame.at_command_parts() {
        Some((command, param)) if param.is_empty() => {
            let value = registers.get(&command).cloned().unwrap_or_default();
            vec![reply(frame, 0, &value)]
        }
        Some((command, param)) => {
            registers.insert(command, param.to_vec());
            vec![reply(frame, 0, &[])]
        }
        None => vec![reply(frame, 0, &[])],
    }
}

fn fast() -> ClientConfig {
    ClientConfig::default().with_response_timeout(Duration::from_millis(200))
}

/// Blocking queue that holds exactly one two-byte datagram from `PEER`.
fn one_slot_blocking() -> ClientConfig {
    fast()
        .with_overflow(OverflowPolicy::Block)
        .with_queue_capacity(InboundQueue::record_size(&PEER, 2))
}

const PEER: Address = Address::Short([0, 1]);

fn wait_for_frames(client: &Client<MemorySink>, frames: u64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while client.stats().frames < frames {
        assert!(Instant::now() < deadline, "dispatcher never saw {frames} frames");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn acknowledged_send_returns_length() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, &[])]);

    let sent = radio
        .client
        .send_datagram(&Address::Short([0x12, 0x34]), b"hi", Delivery::Acknowledged)
        .expect("send should be acknowledged");
    assert_eq!(sent, 2);

    let seen = radio.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].frame_type, FrameType::TxRequestShort);
    assert_eq!(seen[0].frame_id(), Some(1));
    assert_eq!(Address::from_frame(&seen[0]), Address::Short([0x12, 0x34]));
    assert_eq!(seen[0].tx_data(), Some(&b"hi"[..]));
}

#[test]
fn negative_tx_status_is_protocol_violation() {
    let radio = start(fast(), |frame| vec![reply(frame, 1, &[])]);

    let err = radio
        .client
        .send_datagram(&Address::Short([0x12, 0x34]), b"hi", Delivery::Acknowledged)
        .expect_err("status 1 should fail the send");
    assert!(matches!(err, ClientError::ProtocolViolation(_)), "{err}");
}

#[test]
fn long_address_uses_tx64() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, &[])]);
    let peer = Address::Long([0x00, 0x13, 0xa2, 0x00, 0x40, 0x52, 0x2b, 0xaa]);

    radio
        .client
        .send_datagram(&peer, b"ping", Delivery::Acknowledged)
        .expect("send should be acknowledged");

    let seen = radio.seen();
    assert_eq!(seen[0].frame_type, FrameType::TxRequestLong);
    assert_eq!(Address::from_frame(&seen[0]), peer);
}

#[test]
fn u32_round_trip_is_big_endian() {
    let radio = start(fast(), echo_registers());

    radio
        .client
        .write_u32("DH", 0x0102_0304)
        .expect("write should succeed");
    let value = radio.client.read_u32("DH").expect("read should succeed");
    assert_eq!(value, 0x0102_0304);

    let seen = radio.seen();
    let (command, param) = seen[0]
        .at_command_parts()
        .expect("first frame should be an AT command");
    assert_eq!(command.to_string(), "DH");
    assert_eq!(param, &[0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn u8_and_u16_round_trip() {
    let radio = start(fast(), echo_registers());

    radio.client.write_u8("CH", 0x0c).expect("write u8");
    radio.client.write_u16("MY", 0xbeef).expect("write u16");
    assert_eq!(radio.client.read_u8("CH").expect("read u8"), 0x0c);
    assert_eq!(radio.client.read_u16("MY").expect("read u16"), 0xbeef);
}

#[test]
fn wrong_width_is_length_mismatch() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, &[1, 2, 3])]);

    let err = radio.client.read_u16("MY").expect_err("3 bytes is not a u16");
    assert!(matches!(
        err,
        ClientError::LengthMismatch {
            expected: 2,
            actual: 3
        }
    ));
}

#[test]
fn at_command_read_truncates_to_buffer() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, b"XBEE-802.15.4")]);

    let mut buf = [0u8; 4];
    let n = radio
        .client
        .at_command_read("NI", &mut buf)
        .expect("read should succeed");
    assert_eq!(&buf[..n], b"XBEE");
}

#[test]
fn unsolicited_datagram_is_queued() {
    let mut radio = start(fast(), |_| Vec::new());
    radio.inject(Frame::rx_short([0x12, 0x34], 0x28, b"abc"));

    let mut buf = [0u8; 16];
    let (n, from) = radio
        .client
        .receive_datagram(&mut buf)
        .expect("datagram should arrive");
    assert_eq!(&buf[..n], b"abc");
    assert_eq!(from, Address::Short([0x12, 0x34]));

    let stats = radio.client.stats();
    assert_eq!(stats.datagrams, 1);
    assert_eq!(stats.responses, 0);
}

#[test]
fn receive_truncates_and_moves_to_next_record() {
    let mut radio = start(fast(), |_| Vec::new());
    radio.inject(Frame::rx_long([1; 8], 0, b"0123456789"));
    radio.inject(Frame::rx_short([0, 2], 0, b"next"));

    let mut small = [0u8; 4];
    let (n, from) = radio
        .client
        .receive_datagram(&mut small)
        .expect("first datagram");
    assert_eq!(&small[..n], b"0123");
    assert_eq!(from, Address::Long([1; 8]));

    let mut buf = [0u8; 16];
    let (n, from) = radio
        .client
        .receive_datagram(&mut buf)
        .expect("second datagram");
    assert_eq!(&buf[..n], b"next");
    assert_eq!(from, Address::Short([0, 2]));
}

#[test]
fn receive_timeout_on_quiet_link() {
    let radio = start(fast(), |_| Vec::new());
    let mut buf = [0u8; 8];
    let err = radio
        .client
        .receive_datagram_timeout(&mut buf, Duration::from_millis(20))
        .expect_err("nothing was sent");
    assert!(matches!(err, ClientError::WouldBlock));
}

#[test]
fn non_blocking_read_fails_fast() {
    let radio = start(fast().with_non_blocking_read(true), |_| Vec::new());
    let mut buf = [0u8; 8];
    let start = Instant::now();
    assert!(matches!(
        radio.client.receive_datagram(&mut buf),
        Err(ClientError::WouldBlock)
    ));
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn timeout_then_late_response_is_ignored() {
    let mut first_id = None;
    let radio = start(fast().with_response_timeout(Duration::from_millis(50)), move |frame| {
        match first_id {
            None => {
                first_id = frame.frame_id();
                Vec::new()
            }
            Some(stale) => vec![Frame::tx_status(stale, 0), reply(frame, 0, &[])],
        }
    });

    let err = radio
        .client
        .write_u8("CH", 0x0c)
        .expect_err("first request gets no answer");
    assert!(matches!(err, ClientError::Timeout(_)), "{err}");

    radio
        .client
        .write_u8("CH", 0x0d)
        .expect("second request should not be confused by the stale status");

    let stats = radio.client.stats();
    assert_eq!(stats.unmatched, 1);
    assert_eq!(stats.responses, 1);
}

#[test]
fn concurrent_requests_are_serialized() {
    let (request_sink, mut requests) = memory::channel();
    let (mut response_sink, responses) = memory::channel();
    let (client, _dispatch) =
        spawn(responses, request_sink, fast()).expect("dispatch thread should start");
    let client = Arc::new(client);

    let overlapped = Arc::new(AtomicBool::new(false));
    let ids = Arc::new(Mutex::new(Vec::new()));
    let radio = {
        let overlapped = Arc::clone(&overlapped);
        let ids = Arc::clone(&ids);
        thread::spawn(move || {
            while let Ok(frame) = requests.read_frame() {
                thread::sleep(Duration::from_millis(2));
                if let Ok(Some(_)) = requests.try_read_frame() {
                    overlapped.store(true, Ordering::SeqCst);
                }
                ids.lock().expect("ids lock").push(frame.frame_id());
                if response_sink.write_frame(&reply(&frame, 0, &[])).is_err() {
                    return;
                }
            }
        })
    };

    let workers: Vec<_> = (0..4u8)
        .map(|n| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..5u8 {
                    client.write_u8("CH", n * 10 + i).expect("write should succeed");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker should not panic");
    }
    drop(client);
    radio.join().expect("radio should not panic");

    assert!(!overlapped.load(Ordering::SeqCst), "two requests were in flight");
    let ids = ids.lock().expect("ids lock").clone();
    let expected: Vec<_> = (1..=20u8).map(Some).collect();
    assert_eq!(ids, expected);
}

#[test]
fn pin_helpers_issue_d_commands() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, &[])]);
    let d3: Pin = "D3".parse().expect("D3 is a pin");
    let d1 = Pin::new(1).expect("D1 is a pin");

    radio.client.pin_write(d3, true).expect("pin write");
    assert!(radio.client.pin_level(d3));
    assert!(!radio.client.pin_toggle(d3).expect("toggle low"));
    assert!(radio.client.pin_toggle(d3).expect("toggle high"));
    radio
        .client
        .pin_set_mode(d1, PinMode::Input)
        .expect("set mode");
    radio.client.pin_convert(d1).expect("convert");

    let commands: Vec<(String, Vec<u8>)> = radio
        .seen()
        .iter()
        .map(|frame| {
            let (command, param) = frame.at_command_parts().expect("AT command");
            (command.to_string(), param.to_vec())
        })
        .collect();
    assert_eq!(
        commands,
        vec![
            ("D3".to_string(), vec![5]),
            ("D3".to_string(), vec![4]),
            ("D3".to_string(), vec![5]),
            ("D1".to_string(), vec![3]),
            ("IS".to_string(), vec![]),
        ]
    );
}

#[test]
fn rejected_pin_write_keeps_shadow() {
    let radio = start(fast(), |frame| vec![reply(frame, 1, &[])]);
    let d2 = Pin::new(2).expect("D2 is a pin");

    assert!(radio.client.pin_write(d2, true).is_err());
    assert!(!radio.client.pin_level(d2));
}

#[test]
fn unknown_pin_name_is_no_device() {
    assert!(matches!("D12".parse::<Pin>(), Err(ClientError::NoDevice(_))));
}

#[test]
fn transport_close_disconnects_client() {
    let (request_sink, _requests) = memory::channel();
    let (response_sink, responses) = memory::channel();
    let (client, dispatch) =
        spawn(responses, request_sink, fast()).expect("dispatch thread should start");
    assert_eq!(dispatch.thread().name(), Some(DISPATCH_THREAD_NAME));

    drop(response_sink);
    dispatch.join().expect("dispatcher should exit cleanly");

    let mut buf = [0u8; 8];
    assert!(matches!(
        client.receive_datagram(&mut buf),
        Err(ClientError::Disconnected)
    ));
    assert!(matches!(
        client.write_u8("CH", 1),
        Err(ClientError::Disconnected)
    ));
}

#[test]
fn transport_close_wakes_waiting_request() {
    let (request_sink, _requests) = memory::channel();
    let (response_sink, responses) = memory::channel();
    let config = ClientConfig::default().with_response_timeout(Duration::from_secs(10));
    let (client, dispatch) =
        spawn(responses, request_sink, config).expect("dispatch thread should start");

    let closer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        drop(response_sink);
    });

    let start = Instant::now();
    assert!(matches!(
        client.write_u8("CH", 1),
        Err(ClientError::Disconnected)
    ));
    assert!(start.elapsed() < Duration::from_secs(5));

    closer.join().expect("closer should not panic");
    dispatch.join().expect("dispatcher should exit cleanly");
}

#[test]
fn dropping_everything_stops_dispatch() {
    let radio = start(fast(), |frame| vec![reply(frame, 0, &[])]);
    let Radio {
        client,
        inject,
        dispatch,
        ..
    } = radio;
    drop(client);
    drop(inject);
    dispatch.join().expect("dispatcher should exit once all senders are gone");
}

#[test]
fn full_blocking_queue_delays_responses() {
    let mut radio = start(one_slot_blocking(), echo_registers());
    radio.inject(Frame::rx_short([0, 1], 0, b"aa"));
    radio.inject(Frame::rx_short([0, 1], 0, b"bb"));
    wait_for_frames(&radio.client, 2);

    let err = radio
        .client
        .write_u8("CH", 0x0c)
        .expect_err("dispatcher is parked on the full queue");
    assert!(matches!(err, ClientError::Timeout(_)), "{err}");

    let mut buf = [0u8; 2];
    radio.client.receive_datagram(&mut buf).expect("first datagram");
    assert_eq!(&buf, b"aa");

    radio
        .client
        .write_u8("CH", 0x0d)
        .expect("responses flow again once the queue has room");
    radio.client.receive_datagram(&mut buf).expect("second datagram");
    assert_eq!(&buf, b"bb");

    let stats = radio.client.stats();
    assert_eq!(stats.datagrams, 2);
    assert_eq!(stats.unmatched, 1);
}

#[test]
fn dropping_client_releases_blocked_dispatcher() {
    let mut radio = start(one_slot_blocking(), |_| Vec::new());
    radio.inject(Frame::rx_short([0, 1], 0, b"aa"));
    radio.inject(Frame::rx_short([0, 1], 0, b"bb"));
    wait_for_frames(&radio.client, 2);

    let Radio {
        client,
        inject,
        dispatch,
        ..
    } = radio;
    drop(client);
    drop(inject);

    let deadline = Instant::now() + Duration::from_secs(2);
    while !dispatch.is_finished() {
        assert!(Instant::now() < deadline, "dispatcher still parked on the queue");
        thread::sleep(Duration::from_millis(5));
    }
    dispatch.join().expect("dispatcher should exit cleanly");
}
