//! Integration tests for a full session against a fake radio.
//!
//! The fake radio is a localhost TCP listener for the command transport and
//! a UDP socket sending VITA-49 datagrams to the session's streaming port.
//!
//! # Running
//!
//! ```bash
//! cargo test --test session_integration -- --nocapture
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc::Receiver;
use tokio::time::timeout;

use radiolink::{Session, SessionConfig, SessionError, Sinks};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Configuration pointing at a fake radio listening on `port`.
fn test_config(port: u16) -> SessionConfig {
    SessionConfig {
        radio_addr: "127.0.0.1".to_string(),
        command_port: port,
        udp_port: 0,
        local_ip: Some(LOCALHOST),
        max_read_retries: 2,
        subscriptions: vec!["sub pan all".to_string(), "sub daxiq all".to_string()],
        ..Default::default()
    }
}

/// Connect a session to a fresh fake radio and return the radio's end.
async fn connect(sinks: Sinks) -> (Session, TcpStream) {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let config = test_config(port);
    let (session, accepted) = tokio::join!(
        Session::connect(&config, sinks),
        listener.accept()
    );
    let session = session.expect("Session should connect");
    let (radio, _) = accepted.unwrap();
    (session, radio)
}

/// Read from the radio side until `count` carriage returns have arrived.
async fn read_frames(radio: &mut TcpStream, count: usize) -> Vec<String> {
    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    while received.iter().filter(|&&b| b == b'\r').count() < count {
        let n = timeout(TEST_TIMEOUT, radio.read(&mut buf))
            .await
            .expect("Test timed out")
            .unwrap();
        assert!(n > 0, "Session closed the command transport");
        received.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(received)
        .unwrap()
        .split_inclusive('\r')
        .map(str::to_string)
        .collect()
}

/// Receive response lines until `sentinel` shows up.
async fn recv_until(rx: &mut Receiver<String>, sentinel: &str) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        let line = timeout(TEST_TIMEOUT, rx.recv())
            .await
            .expect("Test timed out")
            .expect("Response sink closed");
        let done = line == sentinel;
        lines.push(line);
        if done {
            return lines;
        }
    }
}

/// Build a FlexRadio meter datagram.
fn meter_datagram(stream_id: u32, readings: &[(u16, i16)]) -> Vec<u8> {
    let payload: Vec<u8> = readings
        .iter()
        .flat_map(|(id, value)| {
            let mut pair = id.to_be_bytes().to_vec();
            pair.extend_from_slice(&value.to_be_bytes());
            pair
        })
        .collect();
    let words = (28 + payload.len()) / 4;
    let header: u32 = (0x3 << 28) | (1 << 27) | (0x1 << 22) | (0x1 << 20) | words as u32;

    let mut datagram = Vec::new();
    datagram.extend_from_slice(&header.to_be_bytes());
    datagram.extend_from_slice(&stream_id.to_be_bytes());
    datagram.extend_from_slice(&0x001C2Du32.to_be_bytes());
    datagram.extend_from_slice(&0x534Cu16.to_be_bytes());
    datagram.extend_from_slice(&0x8002u16.to_be_bytes());
    datagram.extend_from_slice(&[0u8; 12]);
    datagram.extend_from_slice(&payload);
    datagram
}

/// Test: handle assignment, status patches and raw response forwarding.
#[tokio::test]
async fn test_handle_and_status_updates() {
    let mut sinks = Sinks::new();
    let mut responses = sinks.bind_responses(16);
    let (session, mut radio) = connect(sinks).await;

    radio
        .write_all(b"V1.4.0.0\r\nH1234ABCD\r\nS1234ABCD|display pan 0x40000000 wnb=0 center=14.")
        .await
        .unwrap();
    radio
        .write_all(b"100000 bandwidth=0.2\r\nS1234ABCD|daxiq 1 pan=0x40000000 rate=48000\r\nR99|0|\r\n")
        .await
        .unwrap();

    let lines = recv_until(&mut responses, "R99|0|").await;
    assert_eq!(
        lines,
        vec![
            "V1.4.0.0",
            "S1234ABCD|display pan 0x40000000 wnb=0 center=14.100000 bandwidth=0.2",
            "S1234ABCD|daxiq 1 pan=0x40000000 rate=48000",
            "R99|0|",
        ]
    );

    assert_eq!(session.handle(), Some("1234ABCD"));
    let pan = session.panadapters().get(&"0x40000000".to_string()).unwrap();
    assert_eq!(pan.center, 14_100_000);
    let stream = session.iq_streams().get(&1).unwrap();
    assert_eq!(stream.pan, "0x40000000");
    assert_eq!(stream.rate, 48000);
}

/// Test: commands are framed and numbered from 1.
#[tokio::test]
async fn test_commands_are_sequenced() {
    let (session, mut radio) = connect(Sinks::new()).await;

    let sequences = session
        .subscribe(&["sub pan all".to_string(), "sub daxiq all".to_string()])
        .await
        .unwrap();
    let third = session.send_command("display pan create").await.unwrap();

    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(third, 3);
    assert_eq!(
        read_frames(&mut radio, 3).await,
        vec!["C1|sub pan all\r", "C2|sub daxiq all\r", "C3|display pan create\r"]
    );
}

/// Test: a configured local address is used for the streaming socket.
#[tokio::test]
async fn test_configured_local_ip_binds_streaming_socket() {
    let (session, _radio) = connect(Sinks::new()).await;

    let endpoint = session.udp_endpoint();
    assert_eq!(endpoint.ip(), LOCALHOST);
    assert_ne!(endpoint.port(), 0);
    assert!(session.is_active());
}

/// Test: meter datagrams reach the meter sink; discovery does not.
#[tokio::test]
async fn test_meter_datagram_delivered() {
    let mut sinks = Sinks::new();
    let mut meters = sinks.bind_meter(4);
    let (session, _radio) = connect(sinks).await;

    let sender = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
    let mut discovery = meter_datagram(0, &[]);
    discovery[14..16].copy_from_slice(&0xFFFFu16.to_be_bytes());
    sender.send_to(&discovery, session.udp_endpoint()).await.unwrap();
    sender
        .send_to(&meter_datagram(0x700, &[(1, -120), (2, 30)]), session.udp_endpoint())
        .await
        .unwrap();

    let packet = timeout(TEST_TIMEOUT, meters.recv())
        .await
        .expect("Test timed out")
        .unwrap();
    assert_eq!(packet.stream_id, 0x700);
    assert_eq!(packet.readings.len(), 2);
    assert_eq!(packet.readings[0].value, -120);
    assert_eq!(packet.readings[1].id, 2);
}

/// Test: the session reports a clean close when the radio hangs up.
#[tokio::test]
async fn test_radio_close_ends_session() {
    let mut sinks = Sinks::new();
    let mut responses = sinks.bind_responses(4);
    let (session, mut radio) = connect(sinks).await;

    radio.write_all(b"H1\nM1|bye\n").await.unwrap();
    drop(radio);

    let result = timeout(TEST_TIMEOUT, session.closed())
        .await
        .expect("Test timed out");
    assert!(result.is_ok());
    assert_eq!(responses.recv().await.as_deref(), Some("M1|bye"));
    assert_eq!(responses.recv().await, None);
}

/// Test: an unreachable radio yields `ConnectionFailed`.
#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    match Session::connect(&test_config(port), Sinks::new()).await {
        Err(SessionError::ConnectionFailed(_)) => {}
        Err(other) => panic!("Expected ConnectionFailed, got {other}"),
        Ok(_) => panic!("Expected connection to fail"),
    }
}
