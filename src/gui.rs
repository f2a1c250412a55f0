// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotBounds, PlotPoint, PlotPoints, Text, VLine};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use crate::config::{AppConfig, DEPTH_RANGE, DEPTH_STEP, REFRESH_RANGE_MS, REFRESH_STEP_MS};
use crate::drivers::{
    parse_bound, render_calibration_png, render_frame_png, render_recording_png,
    AcquisitionError, ChartFrame, ConnectionState, PlotStyle, SessionCommand, Unit,
};
use crate::engine;
use crate::annotation::read_annotations;
use crate::recorder::{annotation_path_for, read_recording};
use crate::types::*;

const LOG_LINES: usize = 8;

pub struct FsrScopeApp {
    config: AppConfig,
    // 系统状态
    connection_mode: ConnectionMode,
    connection: ConnectionState,
    is_recording: bool,
    recording: Arc<AtomicBool>,
    status: String,

    // 视图设置（引擎持有权威副本，这里只是控件状态）
    refresh_ms: u64,
    buffer_depth: usize,
    unit: Unit,
    y_min_text: String,
    y_max_text: String,
    shown: Vec<bool>,
    recorded: Vec<bool>,

    annotation_text: String,
    replay_path: String,
    frame: Option<ChartFrame>,
    log_messages: Vec<String>,

    // 通讯管道
    rx: Receiver<EngineMessage>,
    tx_cmd: Sender<GuiCommand>,
    frames: FrameSlot,
}

impl FsrScopeApp {
    pub fn new(config: AppConfig) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let recording = Arc::new(AtomicBool::new(false));
        let frames = FrameSlot::default();

        // 启动后台引擎
        engine::spawn_thread(tx, rx_cmd, frames.clone(), config.clone(), recording.clone());

        let n = config.num_channels;
        Self {
            connection_mode: ConnectionMode::Hardware,
            connection: ConnectionState::Disconnected,
            is_recording: false,
            recording,
            status: String::new(),
            refresh_ms: config.refresh_interval_ms,
            buffer_depth: config.buffer_depth,
            unit: config.default_unit,
            y_min_text: String::new(),
            y_max_text: String::new(),
            shown: vec![false; n],
            recorded: vec![false; n],
            annotation_text: String::new(),
            replay_path: String::new(),
            frame: None,
            log_messages: Vec::new(),
            rx,
            tx_cmd,
            frames,
            config,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > LOG_LINES {
            self.log_messages.remove(0);
        }
    }

    fn send_view(&self, cmd: SessionCommand) {
        self.tx_cmd.send(GuiCommand::View(cmd)).ok();
    }

    fn start_recording(&mut self) {
        self.recording.store(true, Ordering::Relaxed);
        self.is_recording = true;
        self.tx_cmd
            .send(GuiCommand::StartRecording(self.connection_mode))
            .ok();
    }

    fn stop_recording(&mut self) {
        // 引擎在下一次读取返回后退出录制
        self.recording.store(false, Ordering::Relaxed);
    }

    fn export_png(&mut self, name: &str, png: Result<Vec<u8>, AcquisitionError>) {
        let path = self.config.data_dir.join(name);
        let result = png.and_then(|bytes| {
            std::fs::create_dir_all(&self.config.data_dir)?;
            std::fs::write(&path, bytes)?;
            Ok(())
        });
        match result {
            Ok(()) => self.log(&format!("Saved {}", path.display())),
            Err(e) => self.log(&format!("PNG export failed: {e}")),
        }
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                EngineMessage::Log(s) => self.log(&s),
                EngineMessage::Status(s) => {
                    self.log(&s);
                    self.status = s;
                }
                EngineMessage::Connection(state) => self.connection = state,
                EngineMessage::RecordingStatus(b) => self.is_recording = b,
            }
        }
        if let Some(frame) = self.frames.take() {
            self.frame = Some(frame);
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.add_enabled_ui(!self.is_recording, |ui| {
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
                ui.selectable_value(&mut self.connection_mode, ConnectionMode::Hardware, "REAL");
            });
        });
        let btn_txt = if self.is_recording { "⏹ STOP" } else { "🔴 RECORD" };
        let btn_col = if self.is_recording { Color32::RED } else { Color32::DARK_GRAY };
        if ui
            .add(egui::Button::new(egui::RichText::new(btn_txt).color(Color32::WHITE)).fill(btn_col))
            .clicked()
        {
            if self.is_recording {
                self.stop_recording();
            } else {
                self.start_recording();
            }
        }
        ui.label(format!("Link: {}", self.connection.label()));
        ui.separator();

        ui.label("Refresh interval (ms)");
        let mut refresh = self.refresh_ms;
        if ui
            .add(egui::Slider::new(&mut refresh, REFRESH_RANGE_MS).step_by(REFRESH_STEP_MS))
            .changed()
        {
            self.refresh_ms = refresh;
            self.send_view(SessionCommand::SetRefreshInterval(Duration::from_millis(refresh)));
        }
        ui.label("Buffer depth (samples)");
        let mut depth = self.buffer_depth;
        if ui
            .add(egui::Slider::new(&mut depth, DEPTH_RANGE).step_by(DEPTH_STEP))
            .changed()
        {
            self.buffer_depth = depth;
            self.send_view(SessionCommand::SetBufferDepth(depth));
        }

        let before = self.unit;
        egui::ComboBox::from_id_source("unit_selector")
            .selected_text(self.unit.label())
            .show_ui(ui, |ui| {
                for unit in Unit::ALL {
                    ui.selectable_value(&mut self.unit, unit, unit.label());
                }
            });
        if self.unit != before {
            self.send_view(SessionCommand::SetUnit(self.unit));
        }

        ui.horizontal(|ui| {
            ui.label("Y min");
            let min = ui.add(egui::TextEdit::singleline(&mut self.y_min_text).desired_width(60.0));
            ui.label("max");
            let max = ui.add(egui::TextEdit::singleline(&mut self.y_max_text).desired_width(60.0));
            if min.lost_focus() || max.lost_focus() {
                self.send_view(SessionCommand::SetYBounds(
                    parse_bound(&self.y_min_text),
                    parse_bound(&self.y_max_text),
                ));
            }
        });
        ui.separator();

        egui::Grid::new("pins").striped(true).show(ui, |ui| {
            ui.label("Pin");
            ui.label("Display in graph");
            ui.label("Save data");
            ui.label("Readout");
            ui.end_row();
            for ch in 0..self.config.num_channels {
                ui.label(format!("A{ch}"));
                if ui.checkbox(&mut self.shown[ch], "").changed() {
                    self.send_view(SessionCommand::SetChannelShown(ch, self.shown[ch]));
                }
                if ui.checkbox(&mut self.recorded[ch], "").changed() {
                    self.send_view(SessionCommand::SetChannelRecorded(ch, self.recorded[ch]));
                }
                let readout = self
                    .frame
                    .as_ref()
                    .and_then(|f| Some((f.readouts.get(ch).copied().flatten()?, f.unit)));
                match readout {
                    Some((r, unit)) => ui.monospace(r.summary(unit)),
                    None => ui.monospace("-"),
                };
                ui.end_row();
            }
        });
        ui.separator();

        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.annotation_text);
            if ui.add_enabled(self.is_recording, egui::Button::new("Annotate")).clicked() {
                let message = std::mem::take(&mut self.annotation_text);
                self.send_view(SessionCommand::Annotate(message));
            }
        });
        ui.separator();

        ui.label("PNG EXPORT");
        ui.horizontal(|ui| {
            if ui.button("Chart").clicked() {
                let png = match &self.frame {
                    Some(frame) => render_frame_png(frame, &PlotStyle::default()),
                    None => Err(AcquisitionError::Plot("nothing charted yet".into())),
                };
                let name = format!("chart_{}.png", chrono::Utc::now().timestamp());
                self.export_png(&name, png);
            }
            if ui.button("Calibration").clicked() {
                let png = render_calibration_png(&self.config.converter(), self.unit, &PlotStyle::default());
                self.export_png("calibration.png", png);
            }
        });
        ui.horizontal(|ui| {
            ui.text_edit_singleline(&mut self.replay_path);
            if ui.button("Replay").clicked() {
                let source = PathBuf::from(self.replay_path.trim());
                let converter = self.config.converter();
                // 旁注文件可以不存在
                let markers = read_annotations(&annotation_path_for(&source)).unwrap_or_default();
                let png = read_recording(&source).and_then(|samples| {
                    render_recording_png(&samples, &markers, self.unit, &converter, &PlotStyle::default())
                });
                let name = replay_png_name(&source);
                self.export_png(&name, png);
            }
        });

        ui.add_space(10.0);
        egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
            for m in &self.log_messages {
                ui.monospace(m);
            }
        });
    }

    fn chart(&self, ui: &mut egui::Ui) {
        let Some(frame) = &self.frame else {
            ui.label("Select a pin under \"Display in graph\" and start recording.");
            return;
        };
        ui.heading(&frame.title);
        ui.label(format!("{} | saved {} measurements", frame.unit.label(), frame.saved));
        let x_range = frame
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p[0]))
            .fold(None, |acc: Option<(f64, f64)>, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            });
        Plot::new("fsr_plot")
            .x_axis_label("Time (ms)")
            .y_axis_label(frame.unit.label())
            .show(ui, |plot_ui| {
                for s in &frame.series {
                    if s.points.is_empty() {
                        continue;
                    }
                    plot_ui.line(
                        Line::new(PlotPoints::new(s.points.clone()))
                            .name(format!("A{}", s.channel))
                            .color(channel_color(s.channel)),
                    );
                }
                let label_y = frame.y_bounds.map(|b| b.max).unwrap_or(0.0);
                for m in &frame.markers {
                    let x = m.timestamp_ms as f64;
                    plot_ui.vline(VLine::new(x).color(Color32::GRAY));
                    if !m.message.is_empty() {
                        plot_ui.text(Text::new(PlotPoint::new(x, label_y), m.message.clone()));
                    }
                }
                if let (Some(b), Some((x_min, x_max))) = (frame.y_bounds, x_range) {
                    plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, b.min], [x_max, b.max]));
                }
            });
    }
}

fn channel_color(channel: usize) -> Color32 {
    const COLORS: [Color32; 6] = [
        Color32::from_rgb(0, 255, 255),
        Color32::YELLOW,
        Color32::from_rgb(255, 0, 255),
        Color32::GREEN,
        Color32::from_rgb(255, 128, 0),
        Color32::LIGHT_BLUE,
    ];
    COLORS[channel % COLORS.len()]
}

fn replay_png_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_owned());
    format!("{stem}.png")
}

impl eframe::App for FsrScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();
        if self.is_recording {
            ctx.request_repaint_after(Duration::from_millis(self.refresh_ms.max(1)));
        }

        let mut visuals = egui::Visuals::dark();
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(10, 10, 15);
        ctx.set_visuals(visuals);

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(egui::RichText::new(&self.status).strong());
        });
        egui::SidePanel::left("L").min_width(320.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("FSR Scope");
            ui.separator();
            egui::ScrollArea::vertical().show(ui, |ui| self.controls(ui));
        });
        egui::CentralPanel::default().show(ctx, |ui| self.chart(ui));
    }
}
