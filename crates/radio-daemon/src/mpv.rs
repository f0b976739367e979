/// mpv-backed audio engine.
///
/// Each opened stream gets its own `mpv` child with a JSON IPC socket:
///
/// ```text
///   open(url)   spawn mpv <url> --input-ipc-server=<sock>, wait for the socket
///   set_gain    {"command": ["set_property", "volume", <0..100>]}
///   tick        non-blocking: one read of pending IPC lines + child liveness
///   close       {"command": ["quit"]}, then kill + reap the child
/// ```
///
/// Unsolicited mpv events that matter to the controller (end of file, IPC
/// loss, process exit) are forwarded to the status sink under the `"mpv"`
/// source key.
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use radio_core::engine::{AudioEngine, EngineError};
use radio_core::throttle::StatusSink;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const STATUS_SOURCE: &str = "mpv";

/// Status codes reported to the sink.
pub const CODE_END_OF_FILE: i32 = 1;
pub const CODE_STREAM_ERROR: i32 = 2;
pub const CODE_IPC_LOST: i32 = 3;
pub const CODE_PROCESS_EXITED: i32 = 4;

const SOCKET_POLL: Duration = Duration::from_millis(50);

/// An mpv event that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// For `end-file` events, the reason mpv gives ("eof", "error", ...).
    pub fn end_reason(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        self.raw.get("reason")?.as_str()
    }
}

/// One line received over IPC.
#[derive(Debug)]
pub enum IpcLine {
    Reply { request_id: u64, ok: bool, error: String },
    Event(MpvEvent),
}

pub fn parse_line(line: &str) -> Option<IpcLine> {
    let raw: Value = serde_json::from_str(line.trim()).ok()?;
    if let Some(request_id) = raw.get("request_id").and_then(|v| v.as_u64()) {
        let error = raw["error"].as_str().unwrap_or("unknown error").to_string();
        return Some(IpcLine::Reply {
            request_id,
            ok: error == "success",
            error,
        });
    }
    raw.get("event")?;
    Some(IpcLine::Event(MpvEvent { raw }))
}

pub fn encode_command(command: Value, request_id: u64) -> String {
    let mut line = json!({ "command": command, "request_id": request_id }).to_string();
    line.push('\n');
    line
}

pub fn volume_percent(gain: f32) -> i64 {
    (gain * 100.0).clamp(0.0, 100.0).round() as i64
}

struct Player {
    child: Child,
    ipc: UnixStream,
    read_buf: Vec<u8>,
}

pub struct MpvEngine {
    binary: PathBuf,
    socket_path: PathBuf,
    open_timeout: Duration,
    next_request_id: u64,
    player: Option<Player>,
}

impl MpvEngine {
    pub fn new(binary: PathBuf, socket_path: PathBuf, open_timeout: Duration) -> Self {
        Self {
            binary,
            socket_path,
            open_timeout,
            next_request_id: 1,
            player: None,
        }
    }

    fn send(&mut self, command: Value) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let Some(player) = self.player.as_mut() else {
            return;
        };
        let line = encode_command(command, request_id);
        debug!("mpv: send req={} payload={}", request_id, line.trim());
        if let Err(e) = player.ipc.write_all(line.as_bytes()) {
            warn!("mpv: write error: {}", e);
        }
    }

    fn spawn(&self, url: &str) -> anyhow::Result<Player> {
        let _ = std::fs::remove_file(&self.socket_path);

        let mut child = Command::new(&self.binary)
            .arg("--no-video")
            .arg("--idle=no")
            .arg("--quiet")
            .arg(format!(
                "--input-ipc-server={}",
                self.socket_path.display()
            ))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let deadline = Instant::now() + self.open_timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                anyhow::bail!("player exited during start-up ({})", status);
            }
            if self.socket_path.exists() {
                if let Ok(ipc) = UnixStream::connect(&self.socket_path) {
                    ipc.set_nonblocking(true)?;
                    return Ok(Player {
                        child,
                        ipc,
                        read_buf: Vec::new(),
                    });
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("player IPC socket did not appear");
            }
            std::thread::sleep(SOCKET_POLL);
        }
    }

    /// Handle complete lines in the read buffer.  Returns `false` once the
    /// stream is over.
    fn drain_lines(player: &mut Player, status: &mut dyn StatusSink) -> bool {
        let mut alive = true;
        while let Some(pos) = player.read_buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = player.read_buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_line(&line) {
                Some(IpcLine::Reply {
                    request_id,
                    ok,
                    error,
                }) => {
                    if ok {
                        debug!("mpv: response req={} ok", request_id);
                    } else {
                        warn!("mpv: response req={} err={}", request_id, error);
                    }
                }
                Some(IpcLine::Event(event)) => match event.end_reason() {
                    Some("error") => {
                        let detail = event.raw["file_error"].as_str().unwrap_or("stream error");
                        status.report(STATUS_SOURCE, CODE_STREAM_ERROR, detail);
                        alive = false;
                    }
                    Some(reason @ ("eof" | "network" | "quit")) => {
                        status.report(STATUS_SOURCE, CODE_END_OF_FILE, reason);
                        alive = false;
                    }
                    Some(reason) => debug!("mpv: end-file reason={}, playback continues", reason),
                    None => debug!("mpv: event {:?}", event.event_name()),
                },
                None => debug!("mpv: ignoring line '{}'", line.trim()),
            }
        }
        alive
    }
}

impl AudioEngine for MpvEngine {
    fn open(&mut self, url: &str) -> Result<(), EngineError> {
        self.close();
        info!("mpv: spawning player for {}", url);
        match self.spawn(url) {
            Ok(player) => {
                info!("mpv: connected to IPC socket");
                self.player = Some(player);
                Ok(())
            }
            Err(e) => Err(EngineError::Open {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn close(&mut self) {
        if self.player.is_none() {
            return;
        }
        self.send(json!(["quit"]));
        if let Some(mut player) = self.player.take() {
            let _ = player.child.kill();
            let _ = player.child.wait();
            debug!("mpv: player reaped");
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }

    fn set_gain(&mut self, gain: f32) {
        self.send(json!(["set_property", "volume", volume_percent(gain)]));
    }

    fn tick(&mut self, status: &mut dyn StatusSink) -> bool {
        let Some(player) = self.player.as_mut() else {
            return false;
        };

        match player.child.try_wait() {
            Ok(Some(exit)) => {
                status.report(
                    STATUS_SOURCE,
                    CODE_PROCESS_EXITED,
                    &format!("player exited ({})", exit),
                );
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                status.report(STATUS_SOURCE, CODE_PROCESS_EXITED, &e.to_string());
                return false;
            }
        }

        let mut chunk = [0u8; 4096];
        match player.ipc.read(&mut chunk) {
            Ok(0) => {
                status.report(STATUS_SOURCE, CODE_IPC_LOST, "IPC connection closed");
                return false;
            }
            Ok(n) => player.read_buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => {
                status.report(STATUS_SOURCE, CODE_IPC_LOST, &e.to_string());
                return false;
            }
        }

        Self::drain_lines(player, status)
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.close();
    }
}
