use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use crate::annotation::{AnnotationLog, Marker};
use crate::drivers::buffer::ChannelBank;
use crate::drivers::line::{decode_line, parse_line, ParsedLine, RawSample};
use crate::drivers::source::LineSource;
use crate::drivers::view::{BufferReset, ViewState, YBounds};
use crate::drivers::{AcquisitionError, Unit, UnitConverter};
use crate::recorder::RecordSink;
use crate::session_log::{format_running, Reporter};
/// Receives one chart snapshot per redraw.
pub trait Renderer {
    fn render(&mut self, frame: ChartFrame);
}
/// Hands over user input that arrived since the last call. Called once per
/// loop iteration so the interface stays live during acquisition.
pub trait EventPump {
    fn drain(&mut self) -> Vec<SessionCommand>;
}
/// User input that mutates acquisition state.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    SetUnit(Unit),
    SetRefreshInterval(Duration),
    SetBufferDepth(usize),
    SetYBounds(Option<f64>, Option<f64>),
    SetChannelShown(usize, bool),
    SetChannelRecorded(usize, bool),
    Annotate(String),
}
/// Latest sample of one channel, kept whether or not it is charted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Readout {
    pub timestamp_ms: i64,
    pub code: i64,
    pub millivolts: i64,
    pub force_newtons: f64,
    /// In the instantaneous form of the selected unit.
    pub value: f64,
}
impl Readout {
    /// `"<mV> mV / <N> N"` regardless of the chart, then the value in `unit`.
    pub fn summary(&self, unit: Unit) -> String {
        let fixed = format!("{} mV / {:.2} N", self.millivolts, self.force_newtons);
        match unit {
            Unit::Raw => format!("{fixed} | {}", self.code),
            unit => format!("{fixed} | {:.3} {}", self.value, unit.symbol()),
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSeries {
    pub channel: usize,
    pub points: Vec<[f64; 2]>,
}
/// Immutable snapshot of everything a redraw needs.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartFrame {
    pub title: String,
    pub unit: Unit,
    pub series: Vec<ChannelSeries>,
    /// `None` lets the renderer auto-scale.
    pub y_bounds: Option<YBounds>,
    pub markers: Vec<Marker>,
    pub readouts: Vec<Option<Readout>>,
    pub saved: u64,
}
/// What happened to one line handed to [`AcquisitionLoop::ingest_line`].
#[derive(Clone, Debug, PartialEq)]
pub enum LineOutcome {
    /// Buffered for the chart.
    Charted(RawSample),
    /// Valid, but the channel is not shown.
    ReadoutOnly(RawSample),
    Dropped,
    Malformed(String),
}
/// Routes parsed samples to the record sink, readouts and channel buffers, and
/// paces redraws. Owns all mutable acquisition state; nothing else touches it.
pub struct AcquisitionLoop {
    converter: UnitConverter,
    view: ViewState,
    bank: ChannelBank,
    readouts: Vec<Option<Readout>>,
    annotations: AnnotationLog,
    saved: u64,
    recording_no: u32,
    started: Instant,
    last_draw: Instant,
}
impl AcquisitionLoop {
    pub fn new(converter: UnitConverter, view: ViewState, num_channels: usize) -> Self {
        let now = Instant::now();
        Self {
            converter,
            bank: ChannelBank::new(num_channels, view.buffer_depth()),
            view,
            readouts: vec![None; num_channels],
            annotations: AnnotationLog::default(),
            saved: 0,
            recording_no: 0,
            started: now,
            last_draw: now,
        }
    }
    pub fn num_channels(&self) -> usize {
        self.bank.num_channels()
    }
    /// Prepares for recording number `recording_no`. Buffers start empty and the
    /// first redraw happens one refresh interval from `now`.
    pub fn begin_recording(&mut self, recording_no: u32, annotations: AnnotationLog, now: Instant) {
        self.recording_no = recording_no;
        self.annotations = annotations;
        self.saved = 0;
        self.started = now;
        self.last_draw = now;
        self.bank.reset_all();
    }
    /// Logs the summary and clears chart state.
    pub fn end_recording(&mut self, reporter: &mut dyn Reporter) {
        reporter.log(&format!(
            "Stopping recording, saved {} measurements",
            self.saved
        ));
        self.bank.reset_all();
        self.annotations.clear();
        self.recording_no = 0;
    }
    /// Tells the user which channels end up in the data file.
    pub fn report_record_pins(&self, reporter: &mut dyn Reporter) {
        let pins: Vec<String> = self
            .view
            .recorded_channels()
            .filter(|&ch| ch < self.num_channels())
            .map(|ch| format!("A{ch}"))
            .collect();
        if pins.is_empty() {
            reporter.status(&format!(
                "Recording #{} active... WARNING: no data is being saved, select pins to record",
                self.recording_no
            ));
        } else {
            reporter.status(&format!(
                "Recording #{} active... Saving: {}",
                self.recording_no,
                pins.join(", ")
            ));
        }
    }
    pub fn apply(&mut self, cmd: SessionCommand, reporter: &mut dyn Reporter) {
        match cmd {
            SessionCommand::SetUnit(unit) => {
                let reset = self.view.set_unit(unit);
                self.perform_reset(reset, reporter);
                for readout in self.readouts.iter_mut().flatten() {
                    readout.value = unit.convert(readout.code, &self.converter);
                }
            }
            SessionCommand::SetRefreshInterval(interval) => self.view.set_refresh_interval(interval),
            SessionCommand::SetBufferDepth(depth) => {
                self.view.set_buffer_depth(depth);
                self.bank.set_depth(self.view.buffer_depth());
            }
            SessionCommand::SetYBounds(min, max) => self.view.set_y_bounds(min, max),
            SessionCommand::SetChannelShown(ch, shown) => {
                if ch >= self.num_channels() {
                    return;
                }
                let reset = self.view.set_channel_shown(ch, shown);
                self.perform_reset(reset, reporter);
            }
            SessionCommand::SetChannelRecorded(ch, recorded) => {
                if ch >= self.num_channels() {
                    return;
                }
                if self.view.set_channel_recorded(ch, recorded) && self.recording_no > 0 {
                    self.report_record_pins(reporter);
                }
            }
            SessionCommand::Annotate(message) => self.annotate(&message, reporter),
        }
    }
    fn perform_reset(&mut self, reset: BufferReset, reporter: &mut dyn Reporter) {
        match reset {
            BufferReset::None => {}
            BufferReset::Channel(ch) => {
                self.bank.reset(ch);
                reporter.log(&format!("Reset display data for pin A{ch}"));
            }
            BufferReset::All => {
                self.bank.reset_all();
                reporter.log("Reset display data for all pins");
            }
        }
    }
    /// Pins a note to the newest timestamp of the first shown channel that has
    /// data. Without any charted data there is nothing to pin it to.
    pub fn annotate(&mut self, message: &str, reporter: &mut dyn Reporter) {
        let anchor = self
            .view
            .shown_channels()
            .find_map(|ch| self.bank.get(ch).and_then(|b| b.last_time()));
        let Some(timestamp_ms) = anchor else {
            reporter.warn("Nothing on the chart to annotate");
            return;
        };
        reporter.log(&format!("Annotation @ {timestamp_ms} ms: {message}"));
        if let Err(e) = self.annotations.annotate(timestamp_ms, message) {
            reporter.warn(&e.to_string());
        }
    }
    /// Processes one line as read from the device.
    pub fn ingest_line(
        &mut self,
        bytes: &[u8],
        sink: &mut dyn RecordSink,
        reporter: &mut dyn Reporter,
    ) -> LineOutcome {
        let Some(line) = decode_line(bytes) else {
            let lossy = String::from_utf8_lossy(bytes).trim_end().to_owned();
            reporter.log(&AcquisitionError::MalformedLine { line: lossy.clone() }.to_string());
            return LineOutcome::Malformed(lossy);
        };
        let sample = match parse_line(line) {
            ParsedLine::Sample(sample) => sample,
            ParsedLine::Incomplete => return LineOutcome::Dropped,
            ParsedLine::Malformed(line) => {
                reporter.log(&AcquisitionError::MalformedLine { line: line.clone() }.to_string());
                return LineOutcome::Malformed(line);
            }
        };
        let channel = match usize::try_from(sample.channel) {
            Ok(ch) if ch < self.num_channels() => ch,
            _ => {
                reporter.log(&AcquisitionError::MalformedLine { line: line.to_owned() }.to_string());
                return LineOutcome::Malformed(line.to_owned());
            }
        };
        if self.view.is_recorded(channel) {
            match sink.append_line(line) {
                Ok(()) => self.saved += 1,
                Err(e) => reporter.warn(&e.to_string()),
            }
        }
        let unit = self.view.unit();
        self.readouts[channel] = Some(Readout {
            timestamp_ms: sample.timestamp_ms,
            code: sample.code,
            millivolts: (self.converter.to_voltage(sample.code) * 1000.0).round() as i64,
            force_newtons: self.converter.code_to_force(sample.code),
            value: unit.convert(sample.code, &self.converter),
        });
        if !self.view.is_shown(channel) {
            return LineOutcome::ReadoutOnly(sample);
        }
        let Some(buffer) = self.bank.get_mut(channel) else {
            return LineOutcome::ReadoutOnly(sample);
        };
        let value = if unit.is_averaged() {
            unit.average(buffer.window_with(sample.code), &self.converter)
        } else {
            unit.convert(sample.code, &self.converter)
        };
        buffer.push(sample.timestamp_ms, sample.code, value);
        LineOutcome::Charted(sample)
    }
    /// Redraws when the refresh interval has elapsed since the last one.
    pub fn maybe_redraw(&mut self, now: Instant, renderer: &mut dyn Renderer) -> bool {
        if now.duration_since(self.last_draw) < self.view.refresh_interval() {
            return false;
        }
        self.last_draw = now;
        let frame = self.frame(now);
        renderer.render(frame);
        true
    }
    /// Builds a snapshot of the shown channels, dropping markers that scrolled
    /// off the visible window.
    pub fn frame(&mut self, now: Instant) -> ChartFrame {
        let shown: Vec<usize> = self.view.shown_channels().collect();
        let range = shown
            .iter()
            .filter_map(|&ch| self.bank.get(ch).and_then(|b| b.value_range()))
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
        let left_edge = shown
            .iter()
            .filter_map(|&ch| self.bank.get(ch).and_then(|b| b.first_time()))
            .min();
        if let Some(edge) = left_edge {
            self.annotations.prune_before(edge);
        }
        let series = shown
            .iter()
            .filter_map(|&ch| {
                self.bank.get(ch).map(|b| ChannelSeries {
                    channel: ch,
                    points: b.points(),
                })
            })
            .collect();
        ChartFrame {
            title: format!(
                "Recording: {}",
                format_running(now.saturating_duration_since(self.started))
            ),
            unit: self.view.unit(),
            series,
            y_bounds: self.view.y_bounds(range),
            markers: self.annotations.markers().to_vec(),
            readouts: self.readouts.clone(),
            saved: self.saved,
        }
    }
    /// Runs until the user clears `recording` or the transport fails.
    ///
    /// `recording` is re-checked right after every read, so a stop lands within
    /// one read timeout. A read error is returned as
    /// [`AcquisitionError::ReadFailure`] and ends the session.
    pub fn run(
        &mut self,
        source: &mut dyn LineSource,
        sink: &mut dyn RecordSink,
        renderer: &mut dyn Renderer,
        pump: &mut dyn EventPump,
        recording: &AtomicBool,
        reporter: &mut dyn Reporter,
    ) -> Result<(), AcquisitionError> {
        loop {
            for cmd in pump.drain() {
                self.apply(cmd, reporter);
            }
            if !recording.load(Ordering::Relaxed) {
                return Ok(());
            }
            let read = source.read_line();
            if !recording.load(Ordering::Relaxed) {
                return Ok(());
            }
            match read {
                Ok(Some(bytes)) => {
                    self.ingest_line(&bytes, sink, reporter);
                }
                Ok(None) => {}
                Err(e) => {
                    reporter.warn(&format!("Error reading from the serial port: {e}"));
                    return Err(AcquisitionError::ReadFailure(e));
                }
            }
            self.maybe_redraw(Instant::now(), renderer);
        }
    }
}
#[cfg(test)]
impl AcquisitionLoop {
    pub fn bank(&self) -> &ChannelBank {
        &self.bank
    }
    pub fn readouts(&self) -> &[Option<Readout>] {
        &self.readouts
    }
    pub fn annotations(&self) -> &AnnotationLog {
        &self.annotations
    }
    pub fn saved_count(&self) -> u64 {
        self.saved
    }
}
#[cfg(test)]
impl Renderer for Vec<ChartFrame> {
    fn render(&mut self, frame: ChartFrame) {
        self.push(frame);
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use crate::drivers::handshake::{establish, ConnectionState, HandshakeController};
    use crate::drivers::source::{ScriptStep, ScriptedOpener, ScriptedSource};
    use crate::recorder::{read_recording, DataRecorder, RecordingHeader};
    use crate::session_log::MemoryReporter;
    fn engine(unit: Unit) -> AcquisitionLoop {
        let view = ViewState::new(Duration::ZERO, 1000, unit);
        AcquisitionLoop::new(UnitConverter::new(5.06, 10000.0), view, 6)
    }
    fn feed(acq: &mut AcquisitionLoop, lines: &[&str]) -> Vec<String> {
        let mut sink = Vec::new();
        let mut reporter = MemoryReporter::default();
        for l in lines {
            acq.ingest_line(format!("{l}\n").as_bytes(), &mut sink, &mut reporter);
        }
        sink
    }
    /// Pump fed from a queue of per-iteration command batches.
    struct QueuedPump(VecDeque<Vec<SessionCommand>>);
    impl EventPump for QueuedPump {
        fn drain(&mut self) -> Vec<SessionCommand> {
            self.0.pop_front().unwrap_or_default()
        }
    }
    #[test]
    fn recorded_channels_persist_verbatim_regardless_of_shown() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelRecorded(1, true), &mut r);
        let sink = feed(&mut acq, &["0,0,10", "0,1,20", "5, 1 ,30", "6,2,40"]);
        assert_eq!(sink, vec!["0,1,20", "5, 1 ,30"]);
        assert_eq!(acq.saved_count(), 2);
        assert!(acq.bank().iter().all(|(_, b)| b.is_empty()));
    }
    #[test]
    fn readout_updates_even_when_not_shown() {
        let mut acq = engine(Unit::Voltage);
        feed(&mut acq, &["7,3,1023"]);
        let readout = acq.readouts()[3].unwrap();
        assert_eq!(readout.code, 1023);
        assert!((readout.value - 5.06).abs() < 1e-12);
        assert_eq!(readout.force_newtons, acq.converter.code_to_force(1023));
        assert!(acq.bank().get(3).unwrap().is_empty());
    }
    #[test]
    fn readout_keeps_millivolts_and_newtons_across_units() {
        let mut acq = engine(Unit::Voltage);
        let mut r = MemoryReporter::default();
        feed(&mut acq, &["7,3,1023", "7,4,0"]);
        let force = acq.converter.code_to_force(1023);
        let readout = acq.readouts()[3].unwrap();
        assert_eq!(readout.millivolts, 5060);
        assert_eq!(
            readout.summary(Unit::Voltage),
            format!("5060 mV / {force:.2} N | 5.060 V")
        );
        assert_eq!(
            acq.readouts()[4].unwrap().summary(Unit::Voltage),
            "0 mV / 0.00 N | 0.000 V"
        );
        acq.apply(SessionCommand::SetUnit(Unit::Raw), &mut r);
        let readout = acq.readouts()[3].unwrap();
        assert_eq!(readout.millivolts, 5060);
        assert_eq!(readout.summary(Unit::Raw), format!("5060 mV / {force:.2} N | 1023"));
    }
    #[test]
    fn failed_save_still_charts_the_sample() {
        struct FullDisk;
        impl RecordSink for FullDisk {
            fn append_line(&mut self, _line: &str) -> Result<(), AcquisitionError> {
                Err(AcquisitionError::PersistenceFailure(std::io::Error::other("disk full")))
            }
        }
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetChannelRecorded(0, true), &mut r);
        assert!(matches!(
            acq.ingest_line(b"5,0,100\n", &mut FullDisk, &mut r),
            LineOutcome::Charted(_)
        ));
        assert_eq!(acq.saved_count(), 0);
        assert_eq!(r.lines.last().unwrap(), "error saving data: disk full");
        assert_eq!(acq.bank().get(0).unwrap().len(), 1);
        assert_eq!(acq.readouts()[0].unwrap().code, 100);
    }
    #[test]
    fn malformed_and_out_of_range_lines_are_skipped() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        let mut sink = Vec::new();
        assert_eq!(
            acq.ingest_line(b"1,x,2\n", &mut sink, &mut r),
            LineOutcome::Malformed("1,x,2".into())
        );
        assert_eq!(
            acq.ingest_line(b"1,6,2\n", &mut sink, &mut r),
            LineOutcome::Malformed("1,6,2".into())
        );
        assert_eq!(
            acq.ingest_line(b"1,-1,2\n", &mut sink, &mut r),
            LineOutcome::Malformed("1,-1,2".into())
        );
        assert_eq!(acq.ingest_line(b"1,0\n", &mut sink, &mut r), LineOutcome::Dropped);
        assert!(matches!(
            acq.ingest_line(b"2,0,5\n", &mut sink, &mut r),
            LineOutcome::Charted(_)
        ));
        assert_eq!(acq.bank().get(0).unwrap().len(), 1);
        assert!(r.lines.iter().any(|l| l.contains("1,x,2")));
    }
    #[test]
    fn averaged_unit_follows_retained_window() {
        let view = ViewState::new(Duration::ZERO, 2, Unit::Raw);
        let mut acq = AcquisitionLoop::new(UnitConverter::new(5.06, 10000.0), view, 1);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetUnit(Unit::VoltageAvg), &mut r);
        feed(&mut acq, &["0,0,0", "1,0,1023", "2,0,1023"]);
        let values: Vec<f64> = acq.bank().get(0).unwrap().values().collect();
        assert!((values[0] - 2.53).abs() < 1e-9);
        assert!((values[1] - 5.06).abs() < 1e-9);
    }
    #[test]
    fn shrinking_depth_narrows_the_average() {
        let view = ViewState::new(Duration::ZERO, 4, Unit::Raw);
        let mut acq = AcquisitionLoop::new(UnitConverter::new(5.06, 10000.0), view, 1);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetUnit(Unit::VoltageAvg), &mut r);
        feed(&mut acq, &["0,0,0", "1,0,0", "2,0,0"]);
        acq.apply(SessionCommand::SetBufferDepth(2), &mut r);
        feed(&mut acq, &["3,0,1023"]);
        let buffer = acq.bank().get(0).unwrap();
        assert_eq!(buffer.len(), 2);
        // depth 4 would give (0 + 0 + 0 + 5.06) / 4
        let last = buffer.values().last().unwrap();
        assert!((last - 2.53).abs() < 1e-9);
    }
    #[test]
    fn unit_switch_clears_buffers() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetChannelShown(1, true), &mut r);
        feed(&mut acq, &["0,0,100", "0,1,200"]);
        acq.apply(SessionCommand::SetUnit(Unit::Force), &mut r);
        assert!(acq.bank().iter().all(|(_, b)| b.is_empty()));
        feed(&mut acq, &["1,0,100"]);
        let v = acq.bank().get(0).unwrap().values().next().unwrap();
        assert_eq!(v, acq.converter.code_to_force(100));
    }
    #[test]
    fn hiding_a_channel_clears_only_it() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetChannelShown(1, true), &mut r);
        feed(&mut acq, &["0,0,100", "0,1,200"]);
        acq.apply(SessionCommand::SetChannelShown(1, false), &mut r);
        assert_eq!(acq.bank().get(0).unwrap().len(), 1);
        assert!(acq.bank().get(1).unwrap().is_empty());
    }
    #[test]
    fn redraw_is_paced_by_refresh_interval() {
        let view = ViewState::new(Duration::from_millis(250), 1000, Unit::Raw);
        let mut acq = AcquisitionLoop::new(UnitConverter::new(5.06, 10000.0), view, 6);
        let t0 = Instant::now();
        acq.begin_recording(1, AnnotationLog::default(), t0);
        let mut frames: Vec<ChartFrame> = Vec::new();
        assert!(!acq.maybe_redraw(t0 + Duration::from_millis(100), &mut frames));
        assert!(acq.maybe_redraw(t0 + Duration::from_millis(250), &mut frames));
        assert!(!acq.maybe_redraw(t0 + Duration::from_millis(400), &mut frames));
        assert!(acq.maybe_redraw(t0 + Duration::from_secs(61), &mut frames));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].title, "Recording: 0:01:01");
    }
    #[test]
    fn frame_unions_shown_ranges_and_prunes_markers() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        acq.apply(SessionCommand::SetChannelShown(2, true), &mut r);
        acq.apply(SessionCommand::SetBufferDepth(2), &mut r);
        feed(&mut acq, &["10,0,100", "10,2,300", "11,1,900"]);
        acq.apply(SessionCommand::Annotate("early".into()), &mut r);
        let frame = acq.frame(Instant::now());
        assert_eq!(frame.series.len(), 2);
        let b = frame.y_bounds.unwrap();
        assert!((b.min - 95.0).abs() < 1e-9);
        assert!((b.max - 315.0).abs() < 1e-9);
        assert_eq!(frame.markers.len(), 1);
        assert_eq!(frame.markers[0].timestamp_ms, 10);
        feed(&mut acq, &["20,0,100", "30,0,100", "20,2,1", "30,2,1"]);
        let frame = acq.frame(Instant::now());
        assert!(frame.markers.is_empty());
        assert!(acq.annotations().markers().is_empty());
    }
    #[test]
    fn annotation_without_data_is_refused() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::Annotate("nothing".into()), &mut r);
        assert!(acq.annotations().markers().is_empty());
        assert_eq!(r.lines.last().map(String::as_str), Some("Nothing on the chart to annotate"));
    }
    #[test]
    fn record_pin_status_follows_changes() {
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.begin_recording(3, AnnotationLog::default(), Instant::now());
        acq.report_record_pins(&mut r);
        assert!(r.statuses[0].contains("no data is being saved"));
        acq.apply(SessionCommand::SetChannelRecorded(2, true), &mut r);
        acq.apply(SessionCommand::SetChannelRecorded(0, true), &mut r);
        assert_eq!(r.statuses.last().unwrap(), "Recording #3 active... Saving: A0, A2");
        acq.end_recording(&mut r);
        assert_eq!(r.lines.last().unwrap(), "Stopping recording, saved 0 measurements");
    }
    #[test]
    fn stop_is_honoured_right_after_a_read() {
        struct StopOnRead<'a>(&'a AtomicBool);
        impl LineSource for StopOnRead<'_> {
            fn read_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
                self.0.store(false, Ordering::Relaxed);
                Ok(Some(b"0,0,5\n".to_vec()))
            }
        }
        let recording = AtomicBool::new(true);
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        acq.apply(SessionCommand::SetChannelShown(0, true), &mut r);
        let mut sink = Vec::new();
        let mut frames: Vec<ChartFrame> = Vec::new();
        let mut pump = QueuedPump(VecDeque::new());
        acq.run(
            &mut StopOnRead(&recording),
            &mut sink,
            &mut frames,
            &mut pump,
            &recording,
            &mut r,
        )
        .unwrap();
        assert!(acq.bank().get(0).unwrap().is_empty());
        assert!(frames.is_empty());
    }
    #[test]
    fn end_to_end_voltage_session() {
        let dir = tempfile::tempdir().unwrap();
        let lines = ["INIT_COMPLETE", "0,0,0", "10,0,511", "20,0,1023"];
        let mut opener = ScriptedOpener::new(0, ScriptedSource::from_lines(lines));
        let recording = AtomicBool::new(true);
        let mut reporter = MemoryReporter::default();
        let mut hc = HandshakeController::new(Duration::from_secs(5));
        let mut source = establish(
            &mut hc,
            &mut opener,
            &recording,
            Duration::ZERO,
            &mut reporter,
            &mut || {},
        )
        .unwrap()
        .unwrap();
        assert_eq!(hc.state(), ConnectionState::Armed);
        let header = RecordingHeader {
            sample_rate_hz: 50,
            vcc: 5.06,
            pulldown_ohms: 10000.0,
            num_channels: 6,
        };
        let mut recorder = DataRecorder::create(dir.path(), 42, 1, &header).unwrap();
        let mut acq = engine(Unit::Raw);
        acq.begin_recording(1, AnnotationLog::default(), Instant::now());
        let mut pump = QueuedPump(VecDeque::from(vec![vec![
            SessionCommand::SetUnit(Unit::Voltage),
            SessionCommand::SetChannelShown(0, true),
            SessionCommand::SetChannelRecorded(0, true),
        ]]));
        let mut frames: Vec<ChartFrame> = Vec::new();
        let err = acq
            .run(
                source.as_mut(),
                &mut recorder,
                &mut frames,
                &mut pump,
                &recording,
                &mut reporter,
            )
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::ReadFailure(_)));
        let values: Vec<f64> = acq.bank().get(0).unwrap().values().collect();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 2.527_526_881_720_43).abs() < 1e-9);
        assert!((values[2] - 5.06).abs() < 1e-12);
        assert_eq!(acq.saved_count(), 3);
        recorder.finish().unwrap();
        let saved: Vec<String> = read_recording(recorder.path())
            .unwrap()
            .iter()
            .map(RawSample::to_line)
            .collect();
        assert_eq!(saved, vec!["0,0,0", "10,0,511", "20,0,1023"]);
        let text = std::fs::read_to_string(recorder.path()).unwrap();
        let data: Vec<&str> = text.lines().skip(3).collect();
        assert_eq!(data, vec!["0,0,0", "10,0,511", "20,0,1023"]);
        assert!(!frames.is_empty());
    }
    #[test]
    fn read_error_mid_session_is_fatal() {
        let mut source = ScriptedSource::new(vec![
            ScriptStep::Line(b"0,0,1\n".to_vec()),
            ScriptStep::Silence,
            ScriptStep::Fail(std::io::ErrorKind::TimedOut),
        ]);
        let recording = AtomicBool::new(true);
        let mut acq = engine(Unit::Raw);
        let mut r = MemoryReporter::default();
        let mut sink = Vec::new();
        let mut frames: Vec<ChartFrame> = Vec::new();
        let err = acq
            .run(
                &mut source,
                &mut sink,
                &mut frames,
                &mut QueuedPump(VecDeque::new()),
                &recording,
                &mut r,
            )
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(acq.readouts()[0].is_some());
    }
}
