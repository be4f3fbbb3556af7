//! Common test utilities for session integration tests.
//!
//! Provides a scripted stand-in for the hub bound on loopback, plus a
//! session configured to talk to it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use doorlink_network::{Observer, ObserverEvent, PollerConfig, SessionConfig, TransportSession};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// How long tests wait for a datagram or event before failing.
pub const WAIT: Duration = Duration::from_secs(2);

/// One COMMAND line as received by the fake hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub module: String,
    pub correlation_id: u64,
    pub target: String,
    pub action: String,
    pub from: SocketAddr,
}

/// Loopback UDP peer playing the hub.
pub struct FakeHub {
    socket: UdpSocket,
}

impl FakeHub {
    pub async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    /// Receive one raw line.
    pub async fn recv_line(&self) -> (String, SocketAddr) {
        let mut buf = [0u8; 2048];
        let (n, from) = timeout(WAIT, self.socket.recv_from(&mut buf))
            .await
            .expect("hub receive timeout")
            .unwrap();
        (String::from_utf8_lossy(&buf[..n]).into_owned(), from)
    }

    /// Receive and parse one COMMAND line.
    pub async fn recv_command(&self) -> ReceivedCommand {
        let (line, from) = self.recv_line().await;
        assert!(line.ends_with('\n'), "command not newline-terminated: {line:?}");
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), 5, "unexpected command line: {line:?}");
        assert_eq!(tokens[1], "COMMAND");
        ReceivedCommand {
            module: tokens[0].to_string(),
            correlation_id: tokens[2].parse().unwrap(),
            target: tokens[3].to_string(),
            action: tokens[4].to_string(),
            from,
        }
    }

    /// Assert nothing arrives within `window`.
    pub async fn expect_silence(&self, window: Duration) {
        let mut buf = [0u8; 2048];
        let result = timeout(window, self.socket.recv_from(&mut buf)).await;
        assert!(result.is_err(), "unexpected datagram");
    }

    pub async fn send(&self, line: &str, to: SocketAddr) {
        self.socket.send_to(line.as_bytes(), to).await.unwrap();
    }

    /// Answer `cmd` with a FEEDBACK carrying `action`.
    pub async fn reply(&self, cmd: &ReceivedCommand, action: &str) {
        let line = format!(
            "{} FEEDBACK {} {} {}\n",
            cmd.module, cmd.correlation_id, cmd.target, action
        );
        self.send(&line, cmd.from).await;
    }
}

/// Session pointed at `hub` with short test timings.
pub async fn session_for(hub: &FakeHub, reply_timeout: Duration) -> TransportSession {
    let config = SessionConfig {
        hub_addr: hub.addr(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        reply_timeout,
        poller: PollerConfig {
            interval: Duration::from_millis(100),
            max_attempts: 20,
        },
    };
    TransportSession::bind(config).await.unwrap()
}

/// Wait for the next event whose name matches `name`, skipping others.
pub async fn next_named(observer: &mut Observer, name: &str) -> ObserverEvent {
    timeout(WAIT, async {
        loop {
            let event = observer.recv().await.expect("observer stream closed");
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {name} event"))
}
