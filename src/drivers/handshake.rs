//! Connect → wait-for-ready → armed state machine for the device link.
//!
//! The device runs its own self-test after the port opens and only then sends
//! `INIT_COMPLETE`; nothing before that marker is sample data. The controller
//! is a plain state machine driven with explicit `Instant`s; [`establish`] is
//! the blocking driver used by the engine.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use crate::drivers::line::{decode_line, INIT_COMPLETE};
use crate::drivers::source::{LineSource, PortOpener};
use crate::drivers::AcquisitionError;
use crate::session_log::Reporter;
/// Minimum spacing of "port unavailable" notices while connect attempts keep failing.
const NOTICE_INTERVAL: Duration = Duration::from_millis(1000);
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingReady,
    Armed,
    Failed,
}
impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::AwaitingReady => "Waiting for device",
            ConnectionState::Armed => "Armed",
            ConnectionState::Failed => "Connection failed",
        }
    }
}
pub struct HandshakeController {
    state: ConnectionState,
    init_timeout: Duration,
    notice_timer: Instant,
    waiting_since: Instant,
}
impl HandshakeController {
    pub fn new(init_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            state: ConnectionState::Disconnected,
            init_timeout,
            notice_timer: now,
            waiting_since: now,
        }
    }
    pub fn state(&self) -> ConnectionState {
        self.state
    }
    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }
    /// Starts a fresh attempt; also the retry path out of `Failed`.
    pub fn begin(&mut self, now: Instant) {
        self.state = ConnectionState::Disconnected;
        self.notice_timer = now;
    }
    /// Records a failed open. Returns true when the caller should tell the user,
    /// at most once per second and never before the first second has passed.
    pub fn on_open_failed(&mut self, now: Instant) -> bool {
        debug_assert_eq!(self.state, ConnectionState::Disconnected);
        if now.duration_since(self.notice_timer) >= NOTICE_INTERVAL {
            self.notice_timer = now;
            true
        } else {
            false
        }
    }
    pub fn on_open_succeeded(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
        }
    }
    /// Entered unconditionally right after the port opens.
    pub fn await_ready(&mut self, now: Instant) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::AwaitingReady;
            self.waiting_since = now;
        }
    }
    /// Feeds one decoded line (or `None` for a timed-out / undecodable read).
    pub fn on_line(&mut self, line: Option<&str>, now: Instant) -> ConnectionState {
        if self.state != ConnectionState::AwaitingReady {
            return self.state;
        }
        if line.map(str::trim) == Some(INIT_COMPLETE) {
            self.state = ConnectionState::Armed;
        } else if now.duration_since(self.waiting_since) > self.init_timeout {
            self.state = ConnectionState::Failed;
        }
        self.state
    }
    pub fn fail(&mut self) {
        self.state = ConnectionState::Failed;
    }
    /// User-initiated stop; the caller drops the port.
    pub fn stop(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}
/// Opens the port and waits for `INIT_COMPLETE`.
///
/// Returns `Ok(None)` when the user cleared `recording` before the link was
/// armed. `yield_now` runs on every iteration so commands keep flowing while
/// we wait.
pub fn establish(
    controller: &mut HandshakeController,
    opener: &mut dyn PortOpener,
    recording: &AtomicBool,
    retry_pause: Duration,
    reporter: &mut dyn Reporter,
    yield_now: &mut dyn FnMut(),
) -> Result<Option<Box<dyn LineSource + Send>>, AcquisitionError> {
    controller.begin(Instant::now());
    let mut source = loop {
        yield_now();
        if !recording.load(Ordering::Relaxed) {
            controller.stop();
            return Ok(None);
        }
        match opener.open() {
            Ok(source) => break source,
            Err(e) => {
                if controller.on_open_failed(Instant::now()) {
                    reporter.status("Connect the device to USB!");
                    reporter.warn(&e.to_string());
                }
                if !retry_pause.is_zero() {
                    std::thread::sleep(retry_pause);
                }
            }
        }
    };
    controller.on_open_succeeded();
    reporter.log(&format!("Port {} opened", opener.port_name()));
    controller.await_ready(Instant::now());
    reporter.status(controller.state().label());
    loop {
        yield_now();
        if !recording.load(Ordering::Relaxed) {
            controller.stop();
            return Ok(None);
        }
        let bytes = match source.read_line() {
            Ok(bytes) => bytes,
            Err(e) => {
                controller.fail();
                return Err(AcquisitionError::ReadFailure(e));
            }
        };
        let line = match bytes.as_deref().map(decode_line) {
            Some(Some(text)) => Some(text),
            Some(None) => {
                reporter.log("Undecodable line while waiting for the device");
                None
            }
            None => None,
        };
        match controller.on_line(line, Instant::now()) {
            ConnectionState::Armed => {
                reporter.status(&format!(
                    "Connection initiated (port: {})",
                    opener.port_name()
                ));
                return Ok(Some(source));
            }
            ConnectionState::Failed => {
                let timeout_ms = controller.init_timeout().as_millis() as u64;
                reporter.log(&format!(
                    "Device failed to initialize after {} sec",
                    controller.init_timeout().as_secs_f32()
                ));
                return Err(AcquisitionError::HandshakeTimeout { timeout_ms });
            }
            _ => {}
        }
    }
}
