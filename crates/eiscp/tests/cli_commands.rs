#![cfg(feature = "cli")]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::thread;

use eiscp::frame::{Frame, FrameReader};

/// A reply as sent by a receiver, terminated with EOF CR LF.
fn device_reply(code: &str, argument: &str) -> Vec<u8> {
    let mut data = vec![b'!', b'1'];
    data.extend_from_slice(code.as_bytes());
    data.extend_from_slice(argument.as_bytes());
    data.extend_from_slice(&[0x1A, 0x0D, 0x0A]);

    let mut raw = Vec::new();
    raw.extend_from_slice(b"ISCP");
    raw.extend_from_slice(&16u32.to_be_bytes());
    raw.extend_from_slice(&(data.len() as u32).to_be_bytes());
    raw.extend_from_slice(&[1, 0, 0, 0]);
    raw.extend_from_slice(&data);
    raw
}

/// Accept one client and answer each command with `answer(command)`.
fn spawn_device<F>(answer: F) -> (u16, thread::JoinHandle<Vec<Frame>>)
where
    F: Fn(&Frame) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
    let port = listener.local_addr().expect("fake device has addr").port();
    let handle = thread::spawn(move || {
        let mut received = Vec::new();
        let (stream, _) = listener.accept().expect("client should connect");
        let mut writer: TcpStream = stream.try_clone().expect("stream should clone");
        let mut reader = FrameReader::new(stream);
        while let Ok(command) = reader.read_frame() {
            let reply = answer(&command);
            received.push(command);
            if !reply.is_empty() {
                writer.write_all(&reply).expect("device write should succeed");
            }
        }
        received
    });
    (port, handle)
}

fn eiscp(port: u16, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_eiscp"))
        .env_remove("EISCP_HOST")
        .env("EISCP_PORT", port.to_string())
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .args(["--host", "127.0.0.1"])
        .output()
        .expect("eiscp should run")
}

#[test]
fn query_prints_reply_as_json() {
    let (port, device) = spawn_device(|command| {
        assert!(command.is_query());
        device_reply(command.command.as_str(), "01")
    });

    let output = eiscp(port, &["query", "pwr"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"command\":\"PWR\""), "{stdout}");
    assert!(stdout.contains("\"argument\":\"01\""), "{stdout}");

    let received = device.join().expect("device thread should finish");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].argument, "QSTN");
}

#[test]
fn send_without_wait_prints_nothing() {
    let (port, device) = spawn_device(|_| Vec::new());

    let output = eiscp(port, &["send", "MVL", "UP"]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty());

    let received = device.join().expect("device thread should finish");
    assert_eq!(received[0].command.as_str(), "MVL");
    assert_eq!(received[0].argument, "UP");
}

#[test]
fn send_wait_prints_every_collected_frame() {
    let (port, device) = spawn_device(|command| {
        let mut out = device_reply("NLT", "title");
        out.extend(device_reply(command.command.as_str(), "2A"));
        out
    });

    let output = eiscp(port, &["send", "MVL", "2A", "--wait"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[0].contains("\"command\":\"NLT\""));
    assert!(lines[1].contains("\"command\":\"MVL\""));
    drop(device);
}

#[test]
fn strict_send_without_echo_times_out() {
    let (port, _device) = spawn_device(|_| device_reply("NLS", "C0P"));

    let output = eiscp(port, &["send", "PWR", "QSTN", "--strict", "--timeout", "300ms"]);
    assert_eq!(output.status.code(), Some(124), "{output:?}");
}

#[test]
fn refused_connection_returns_3() {
    let port = {
        let finder = TcpListener::bind("127.0.0.1:0").expect("port finder should bind");
        finder.local_addr().expect("port finder has addr").port()
    };

    let output = eiscp(port, &["query", "PWR"]);
    assert_eq!(output.status.code(), Some(3), "{output:?}");
}

#[test]
fn bad_command_code_returns_64() {
    let output = eiscp(1, &["send", "POWER", "01"]);
    assert_eq!(output.status.code(), Some(64), "{output:?}");
}

#[test]
fn listen_prints_pushed_frames_until_count() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
    let port = listener.local_addr().expect("fake device has addr").port();
    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("client should connect");
        thread::sleep(std::time::Duration::from_millis(200));
        let mut out = device_reply("NLT", "now playing");
        out.extend(device_reply("NTM", "00:01:02/00:04:00"));
        out.extend(device_reply("PWR", "01"));
        stream.write_all(&out).expect("device write should succeed");
        // Keep the socket open until the client leaves.
        let mut sink = [0u8; 64];
        while matches!(std::io::Read::read(&mut stream, &mut sink), Ok(n) if n > 0) {}
    });

    let output = eiscp(port, &["listen", "--codes", "NLT,PWR", "--count", "2"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{stdout}");
    assert!(lines[0].contains("now playing"));
    assert!(lines[1].contains("\"command\":\"PWR\""));
    device.join().expect("device thread should finish");
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_eiscp"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
