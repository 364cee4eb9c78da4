//! Drive a client against a simulated module that reflects every datagram
//! back to the sender.
//!
//! Run with:
//!   cargo run -p xbeelink --example loopback --features logging -- \
//!     --count 3 --log-level trace --log-frames

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use clap::Parser;
use xbeelink::client::{spawn, ClientConfig, Delivery, Pin, PinMode};
use xbeelink::frame::memory::{self, MemorySink, MemorySource};
use xbeelink::frame::{print_address, Address, Frame, FrameSink, FrameSource, FrameType};
use xbeelink::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "loopback", about = "XBee client against a simulated module")]
struct Args {
    /// Datagrams to send.
    #[arg(long, default_value_t = 3)]
    count: usize,

    /// Peer address, 4 or 16 hex digits.
    #[arg(long, default_value = "1234")]
    peer: String,

    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    timeout_ms: u64,

    /// Log every frame at trace level.
    #[arg(long)]
    log_frames: bool,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

fn parse_peer(hex: &str) -> Result<Address, String> {
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("bad hex in peer address: {hex}"))
        })
        .collect::<Result<Vec<u8>, String>>()?;
    match bytes.as_slice() {
        [a, b] => Ok(Address::Short([*a, *b])),
        long if long.len() == 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(long);
            Ok(Address::Long(buf))
        }
        _ => Err(format!("peer address must be 2 or 8 bytes: {hex}")),
    }
}

/// Acknowledge every request, keep AT registers, and send each datagram
/// straight back as if the peer had echoed it.
fn simulated_module(mut requests: MemorySource, mut responses: MemorySink) {
    let mut registers: HashMap<[u8; 2], Vec<u8>> = HashMap::new();
    while let Ok(frame) = requests.read_frame() {
        let Some(id) = frame.frame_id() else {
            continue;
        };
        let mut replies = Vec::new();
        match frame.frame_type {
            FrameType::AtCommand => {
                if let Some((command, param)) = frame.at_command_parts() {
                    let value = if param.is_empty() {
                        registers.get(&command.as_bytes()).cloned().unwrap_or_default()
                    } else {
                        registers.insert(command.as_bytes(), param.to_vec());
                        Vec::new()
                    };
                    replies.push(Frame::at_command_response(id, command, 0, &value));
                }
            }
            FrameType::TxRequestShort | FrameType::TxRequestLong => {
                let data = frame.tx_data().unwrap_or_default();
                match Address::from_frame(&frame) {
                    Address::Short(addr) => replies.push(Frame::rx_short(addr, 0x28, data)),
                    Address::Long(addr) => replies.push(Frame::rx_long(addr, 0x28, data)),
                    Address::Invalid => {}
                }
                if id != 0 {
                    replies.push(Frame::tx_status(id, 0));
                }
            }
            _ => {}
        }
        for reply in replies {
            if responses.write_frame(&reply).is_err() {
                return;
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_format, args.log_level);
    let peer = parse_peer(&args.peer)?;

    let (request_sink, request_source) = memory::channel();
    let (response_sink, response_source) = memory::channel();
    let module = thread::spawn(move || simulated_module(request_source, response_sink));

    let config = ClientConfig::default()
        .with_response_timeout(Duration::from_millis(args.timeout_ms))
        .with_log_frames(args.log_frames);
    let (client, dispatch) = spawn(response_source, request_sink, config)?;

    client.write_u16("MY", 0xbeef)?;
    eprintln!("MY = 0x{:04x}", client.read_u16("MY")?);

    let led = Pin::new(0)?;
    client.pin_set_mode(led, PinMode::Output)?;

    let mut stdout = std::io::stdout();
    let mut buf = [0u8; 100];
    for n in 0..args.count {
        let message = format!("hello #{n}");
        let delivery = if n % 2 == 0 {
            Delivery::Acknowledged
        } else {
            Delivery::FireAndForget
        };
        client.send_datagram(&peer, message.as_bytes(), delivery)?;
        client.pin_toggle(led)?;

        let (len, from) = client.receive_datagram_timeout(&mut buf, Duration::from_secs(1))?;
        print_address(&mut stdout, &from)?;
        eprintln!("  {}", String::from_utf8_lossy(&buf[..len]));
    }

    eprintln!("{:?}", client.stats());
    drop(client);
    module.join().map_err(|_| "simulated module panicked")?;
    dispatch.join().map_err(|_| "dispatch thread panicked")?;
    Ok(())
}
