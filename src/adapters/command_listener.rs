//! TCP command listener.
//!
//! Accepts connections on a background thread and reads newline-delimited
//! messages.  Each non-empty line is handed to the [`CommandInbox`] as-is and
//! acknowledged with `ACCEPTED\n`; whether it decodes, or whether the feed
//! ever runs, is the control loop's business.
//!
//! ```text
//! client ── {"command":"feed"}\n ──▶ listener ──deliver()──▶ CommandChannel
//!        ◀────── ACCEPTED\n ───────┘
//! ```

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use log::{debug, error, info, warn};

use crate::channels::{CommandInbox, Disposition, MAX_FRAME_LEN};
use crate::error::CommsError;

const ACK: &[u8] = b"ACCEPTED\n";

pub struct TcpCommandListener {
    local_addr: SocketAddr,
}

impl TcpCommandListener {
    /// Bind and start accepting on a background thread.
    pub fn spawn(addr: impl ToSocketAddrs, inbox: CommandInbox) -> Result<Self, CommsError> {
        let listener = TcpListener::bind(addr).map_err(|e| {
            error!("Listener: bind failed: {}", e);
            CommsError::ListenerBindFailed
        })?;
        let local_addr = listener.local_addr().map_err(|_| CommsError::ListenerBindFailed)?;

        thread::Builder::new()
            .name("command-listener".into())
            .spawn(move || accept_loop(listener, inbox))
            .map_err(|e| {
                error!("Listener: cannot start thread: {}", e);
                CommsError::ListenerBindFailed
            })?;

        info!("Listener: accepting commands on {}", local_addr);
        Ok(Self { local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn accept_loop(listener: TcpListener, inbox: CommandInbox) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let inbox = inbox.clone();
                let spawned = thread::Builder::new()
                    .name("command-conn".into())
                    .spawn(move || serve(stream, &inbox));
                if let Err(e) = spawned {
                    warn!("Listener: cannot serve connection: {}", e);
                }
            }
            Err(e) => warn!("Listener: accept failed: {}", e),
        }
    }
}

fn serve(stream: TcpStream, inbox: &CommandInbox) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
    debug!("Listener: {} connected", peer);

    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(e) => {
            warn!("Listener: {}: {}", peer, e);
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::with_capacity(MAX_FRAME_LEN);

    loop {
        line.clear();
        match read_message(&mut reader, &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Listener: {}: {}", peer, e);
                break;
            }
        }

        let message = line.trim_ascii();
        if message.is_empty() {
            continue;
        }
        if inbox.deliver(message) == Disposition::QueueFull {
            warn!("Listener: message from {} dropped, control loop busy", peer);
        }
        if writer.write_all(ACK).is_err() {
            break;
        }
    }
    debug!("Listener: {} disconnected", peer);
}

/// Read one `\n`-terminated message into `buf`.  Anything past
/// `MAX_FRAME_LEN + 1` bytes is read and thrown away so the next line
/// starts cleanly; the kept prefix is then too long to be queued.
fn read_message<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    let limit = MAX_FRAME_LEN as u64 + 1;
    let n = reader.by_ref().take(limit).read_until(b'\n', buf)?;
    if n as u64 == limit && buf.last() != Some(&b'\n') {
        let mut rest = Vec::new();
        reader.read_until(b'\n', &mut rest)?;
    }
    Ok(n)
}
