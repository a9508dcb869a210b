#![cfg(feature = "cli")]

use std::net::UdpSocket;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use z21link::frame::{
    decode_envelope, Envelope, XBusMessage, LAN_GET_SERIAL_NUMBER, LAN_LOGOFF, LAN_X,
};

type Responder = fn(&Envelope) -> Vec<Envelope>;

/// Serve one client until it logs out, returning every envelope it sent.
fn spawn_station(respond: Responder) -> (u16, JoinHandle<Vec<Envelope>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("fake station should bind");
    socket
        .set_read_timeout(Some(Duration::from_millis(100)))
        .expect("read timeout should apply");
    let port = socket.local_addr().expect("local addr").port();

    let handle = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline {
            let Ok((n, from)) = socket.recv_from(&mut buf) else {
                continue;
            };
            let Ok((envelope, _)) = decode_envelope(&buf[..n]) else {
                continue;
            };
            for reply in respond(&envelope) {
                let bytes = reply.to_bytes().expect("reply encodes");
                socket.send_to(&bytes, from).expect("reply should send");
            }
            let done = envelope.kind == LAN_LOGOFF;
            seen.push(envelope);
            if done {
                break;
            }
        }
        seen
    });
    (port, handle)
}

fn silent(_: &Envelope) -> Vec<Envelope> {
    Vec::new()
}

fn z21link(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_z21link"))
        .args(["--log-level", "error", "--format", "json", "--port"])
        .arg(port.to_string())
        .args(args)
        .output()
        .expect("z21link should run")
}

fn xbus_sent(seen: &[Envelope]) -> Vec<XBusMessage> {
    seen.iter()
        .filter(|envelope| envelope.kind == LAN_X)
        .map(|envelope| envelope.xbus().expect("client sends valid sub-frames"))
        .collect()
}

#[test]
fn info_reports_station_identity() {
    fn respond(request: &Envelope) -> Vec<Envelope> {
        if request.kind == LAN_GET_SERIAL_NUMBER {
            return vec![Envelope::new(
                LAN_GET_SERIAL_NUMBER,
                vec![0x4E, 0x61, 0xBC, 0x00],
            )];
        }
        let Ok(msg) = request.xbus() else {
            return Vec::new();
        };
        match (msg.header, msg.data.as_ref()) {
            (0xF1, [0x0A]) => vec![XBusMessage::new(0xF3, vec![0x0A, 0x01, 0x43]).into_envelope()],
            (0x21, [0x21]) => vec![XBusMessage::new(0x63, vec![0x21, 0x30, 0x12]).into_envelope()],
            _ => Vec::new(),
        }
    }

    let (port, station) = spawn_station(respond);
    let output = z21link(port, &["info", "127.0.0.1"]);
    station.join().expect("fake station thread");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"record\":\"info\""));
    assert!(stdout.contains("\"serial_number\":12345678"));
    assert!(stdout.contains("\"firmware_version\":\"1.43\""));
    assert!(stdout.contains("\"xbus_version\":\"3.0\""));
    assert!(stdout.contains("\"station_id\":18"));
}

#[test]
fn power_on_sends_command_and_logs_out() {
    let (port, station) = spawn_station(silent);
    let output = z21link(port, &["power", "127.0.0.1", "on"]);
    let seen = station.join().expect("fake station thread");

    assert!(output.status.success());
    let commands = xbus_sent(&seen);
    assert!(commands
        .iter()
        .any(|msg| msg.to_bytes().as_ref() == [0x21, 0x81, 0xA0]));
    assert_eq!(seen.last().map(|envelope| envelope.kind), Some(LAN_LOGOFF));
}

#[test]
fn immediate_switch_pulses_output() {
    let (port, station) = spawn_station(silent);
    let output = z21link(
        port,
        &["switch", "127.0.0.1", "--address", "5", "--position", "p1", "--immediate"],
    );
    let seen = station.join().expect("fake station thread");

    assert!(output.status.success());
    let data: Vec<Vec<u8>> = xbus_sent(&seen)
        .into_iter()
        .filter(|msg| msg.header == 0x53)
        .map(|msg| msg.data.to_vec())
        .collect();
    assert_eq!(data, vec![vec![0x00, 0x05, 0x89], vec![0x00, 0x05, 0x81]]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"position\":\"p1\""));
}

#[test]
fn silent_station_times_out_with_124() {
    let (port, station) = spawn_station(silent);
    let output = z21link(port, &["--timeout", "300ms", "loco", "127.0.0.1", "--address", "3"]);
    station.join().expect("fake station thread");

    assert_eq!(output.status.code(), Some(124));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("locomotive state request failed"));
}

#[test]
fn out_of_range_address_is_a_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_z21link"))
        .args(["drive", "127.0.0.1", "--address", "10000", "--stop"])
        .output()
        .expect("z21link should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_z21link"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("z21link {}", env!("CARGO_PKG_VERSION")));
}
