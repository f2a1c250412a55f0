// src/engine.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::annotation::AnnotationLog;
use crate::config::AppConfig;
use crate::drivers::{
    establish, AcquisitionError, AcquisitionLoop, ChartFrame, ConnectionState, EventPump, HandshakeController,
    PortOpener, Renderer, SerialOpener, SessionCommand, SimulatedOpener,
};
use crate::recorder::{annotation_path_for, DataRecorder, RecordingHeader};
use crate::session_log::{Reporter, SessionLog};
use crate::types::*;

/// Pause between failed attempts to open the port.
const RETRY_PAUSE: Duration = Duration::from_millis(100);
/// Self-test time of the simulated device.
const SIM_BOOT_DELAY: Duration = Duration::from_millis(1500);

// 日志同时写入会话日志文件并转发给 GUI
struct EngineReporter {
    log: Option<SessionLog>,
    tx: Sender<EngineMessage>,
}

impl Reporter for EngineReporter {
    fn status(&mut self, msg: &str) {
        match &mut self.log {
            Some(log) => log.status(msg),
            None => log::info!("{msg}"),
        }
        self.tx.send(EngineMessage::Status(msg.to_owned())).ok();
    }
    fn log(&mut self, msg: &str) {
        match &mut self.log {
            Some(log) => log.log(msg),
            None => log::info!("{msg}"),
        }
        self.tx.send(EngineMessage::Log(msg.to_owned())).ok();
    }
    fn warn(&mut self, msg: &str) {
        match &mut self.log {
            Some(log) => log.warn(msg),
            None => log::warn!("{msg}"),
        }
        self.tx.send(EngineMessage::Log(msg.to_owned())).ok();
    }
}

struct FrameSender(FrameSlot);

impl Renderer for FrameSender {
    fn render(&mut self, frame: ChartFrame) {
        self.0.publish(frame);
    }
}

// 录制期间只处理视图命令，重复的开始命令直接丢弃
struct CommandPump<'a>(&'a Receiver<GuiCommand>);

impl EventPump for CommandPump<'_> {
    fn drain(&mut self) -> Vec<SessionCommand> {
        self.0
            .try_iter()
            .filter_map(|cmd| match cmd {
                GuiCommand::View(c) => Some(c),
                GuiCommand::StartRecording(_) => None,
            })
            .collect()
    }
}

/// Starts the owner thread of all acquisition state. It exits once the GUI
/// drops its command sender.
pub fn spawn_thread(
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<GuiCommand>,
    frames: FrameSlot,
    config: AppConfig,
    recording: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let log = match SessionLog::create(&config.log_dir) {
            Ok(log) => Some(log),
            Err(e) => {
                log::warn!("session log unavailable in {}: {e}", config.log_dir.display());
                None
            }
        };
        let session_secs = log.as_ref().map(SessionLog::start_secs).unwrap_or_else(|| {
            chrono::Utc::now().timestamp().max(0) as u64
        });
        let mut reporter = EngineReporter { log, tx: tx.clone() };
        let mut acq = AcquisitionLoop::new(
            config.converter(),
            config.initial_view(),
            config.num_channels,
        );
        let mut recording_no = 0u32;
        reporter.status("Ready to record");
        tx.send(EngineMessage::Connection(ConnectionState::Disconnected)).ok();

        // recv 出错说明 GUI 已退出
        while let Ok(cmd) = rx_cmd.recv() {
            match cmd {
                GuiCommand::View(c) => {
                    acq.apply(c, &mut reporter);
                    frames.publish(acq.frame(Instant::now()));
                }
                GuiCommand::StartRecording(mode) => {
                    // GUI 在引擎取到命令前已经点了停止
                    if !recording.load(Ordering::Relaxed) {
                        tx.send(EngineMessage::RecordingStatus(false)).ok();
                        continue;
                    }
                    recording_no += 1;
                    let session = Session {
                        config: &config,
                        tx: &tx,
                        rx_cmd: &rx_cmd,
                        frames: &frames,
                        recording: recording.as_ref(),
                        session_secs,
                        recording_no,
                    };
                    session.run(mode, &mut acq, &mut reporter);
                    recording.store(false, Ordering::Relaxed);
                    tx.send(EngineMessage::RecordingStatus(false)).ok();
                    tx.send(EngineMessage::Connection(ConnectionState::Disconnected)).ok();
                }
            }
        }
        log::debug!("engine thread exiting");
    })
}

struct Session<'a> {
    config: &'a AppConfig,
    tx: &'a Sender<EngineMessage>,
    rx_cmd: &'a Receiver<GuiCommand>,
    frames: &'a FrameSlot,
    recording: &'a AtomicBool,
    session_secs: u64,
    recording_no: u32,
}

impl Session<'_> {
    fn run(&self, mode: ConnectionMode, acq: &mut AcquisitionLoop, reporter: &mut EngineReporter) {
        let mut opener: Box<dyn PortOpener> = match mode {
            ConnectionMode::Simulation => Box::new(SimulatedOpener::new(
                self.config.num_channels,
                self.config.sample_rate_hz,
                SIM_BOOT_DELAY,
            )),
            ConnectionMode::Hardware => Box::new(SerialOpener::new(
                self.config.port_name.clone(),
                self.config.baud_rate,
                self.config.read_timeout(),
            )),
        };
        self.tx.send(EngineMessage::RecordingStatus(true)).ok();
        self.tx.send(EngineMessage::Connection(ConnectionState::Connecting)).ok();
        reporter.status(ConnectionState::Connecting.label());

        // 握手期间收到的视图命令先攒着，连上之后再应用
        let mut deferred = Vec::new();
        let mut controller = HandshakeController::new(self.config.init_timeout());
        let established = establish(
            &mut controller,
            opener.as_mut(),
            self.recording,
            RETRY_PAUSE,
            reporter,
            &mut || deferred.extend(self.rx_cmd.try_iter()),
        );
        self.tx.send(EngineMessage::Connection(controller.state())).ok();
        for cmd in deferred {
            if let GuiCommand::View(c) = cmd {
                acq.apply(c, reporter);
            }
        }
        let mut source = match established {
            Ok(Some(source)) => source,
            Ok(None) => {
                reporter.status("Recording cancelled");
                return;
            }
            Err(e) => {
                reporter.warn(&e.to_string());
                self.report_end(&e, reporter);
                return;
            }
        };

        let header = RecordingHeader {
            sample_rate_hz: self.config.sample_rate_hz,
            vcc: self.config.vcc,
            pulldown_ohms: self.config.pulldown_ohms,
            num_channels: self.config.num_channels,
        };
        let mut recorder = match DataRecorder::create(
            &self.config.data_dir,
            self.session_secs,
            self.recording_no,
            &header,
        ) {
            Ok(recorder) => recorder,
            Err(e) => {
                reporter.warn(&format!("Cannot create data file: {e}"));
                reporter.status(&format!("Recording #{} failed", self.recording_no));
                return;
            }
        };
        reporter.log(&format!(
            "Recording #{} to {}",
            self.recording_no,
            recorder.path().display()
        ));
        let annotations = AnnotationLog::new(Some(annotation_path_for(recorder.path())));
        acq.begin_recording(self.recording_no, annotations, Instant::now());
        acq.report_record_pins(reporter);

        let result = acq.run(
            source.as_mut(),
            &mut recorder,
            &mut FrameSender(self.frames.clone()),
            &mut CommandPump(self.rx_cmd),
            self.recording,
            reporter,
        );
        drop(source);
        if let Err(e) = recorder.finish() {
            reporter.warn(&e.to_string());
        }
        match result {
            Ok(()) => reporter.status("Ready to record"),
            Err(e) => self.report_end(&e, reporter),
        }
        acq.end_recording(reporter);
        self.frames.publish(acq.frame(Instant::now()));
    }

    // 致命错误结束本次录制；其余错误只提示，可以直接重新录制
    fn report_end(&self, e: &AcquisitionError, reporter: &mut EngineReporter) {
        if e.is_fatal() {
            reporter.status(&format!("Recording #{} stopped: {e}", self.recording_no));
        } else {
            reporter.status(&format!("Recording #{} failed: {e}. Ready to record", self.recording_no));
        }
    }
}
