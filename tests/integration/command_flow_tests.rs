//! Integration tests: remote commands from a TCP client through the command
//! channel into the control loop.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use petfeeder::adapters::command_listener::TcpCommandListener;
use petfeeder::app::events::{FeederEvent, SnapshotKind};
use petfeeder::events::TriggerSource;

use crate::mock_hw::Rig;

struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(listener: &TcpCommandListener) -> Self {
        let stream = TcpStream::connect(listener.local_addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    /// Send one line and wait for the acknowledgement.
    fn send(&mut self, line: &str) -> String {
        self.stream.write_all(line.as_bytes()).unwrap();
        self.stream.write_all(b"\n").unwrap();
        let mut ack = String::new();
        self.reader.read_line(&mut ack).unwrap();
        ack
    }
}

fn listen(rig: &Rig) -> TcpCommandListener {
    TcpCommandListener::spawn("127.0.0.1:0", rig.inbox.clone()).unwrap()
}

#[test]
fn tcp_feed_command_runs_one_feed() {
    let mut rig = Rig::quiet();
    let listener = listen(&rig);
    let mut client = Client::connect(&listener);

    assert_eq!(client.send(r#"{"command":"feed"}"#), "ACCEPTED\n");
    rig.tick();

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(
        rig.count_events(|e| matches!(
            e,
            FeederEvent::FeedCompleted { source: TriggerSource::Remote, .. }
        )),
        1
    );
    assert_eq!(rig.reports.borrow()[0].0.kind, SnapshotKind::Fill);
}

#[test]
fn tcp_garbage_is_acknowledged_then_rejected() {
    let mut rig = Rig::quiet();
    let listener = listen(&rig);
    let mut client = Client::connect(&listener);

    assert_eq!(client.send("not a command"), "ACCEPTED\n");
    rig.tick();

    assert_eq!(rig.core.stats().rejected_commands, 1);
    assert_eq!(rig.engage_count(), 0);
}

#[test]
fn back_to_back_tcp_feeds_run_once() {
    let mut rig = Rig::quiet();
    let listener = listen(&rig);
    let mut client = Client::connect(&listener);

    client.send(r#"{"command":"feed"}"#);
    client.send(r#"{"command":"FEED"}"#);
    rig.tick();

    assert_eq!(rig.engage_count(), 1);
    assert_eq!(rig.core.stats().dropped_triggers, 1);
    assert!(!rig.servo.borrow().overlapped);
}

#[test]
fn two_clients_share_one_control_loop() {
    let mut rig = Rig::quiet();
    let listener = listen(&rig);
    let mut a = Client::connect(&listener);
    let mut b = Client::connect(&listener);

    a.send(r#"{"command":"image"}"#);
    rig.tick();
    b.send(r#"{"command":"feed"}"#);
    rig.tick();

    let reports = rig.reports.borrow();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].0.kind, SnapshotKind::Image);
    assert_eq!(reports[1].0.kind, SnapshotKind::Fill);
    assert_eq!(rig.engage_count(), 1);
}
