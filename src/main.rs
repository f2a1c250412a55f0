// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod annotation;
mod config;
mod drivers;
mod engine;
mod gui;
mod recorder;
mod session_log;
mod types;
use anyhow::Context;
use eframe::egui;
use std::path::Path;
use config::{AppConfig, CONFIG_FILE};
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config_path = Path::new(CONFIG_FILE);
    let config = AppConfig::load_or_default(config_path);
    // 首次运行时写出默认配置，方便用户修改
    if !config_path.exists() {
        if let Err(e) = config.save(config_path) {
            log::warn!("Cannot write default config: {e}");
        }
    }
    config
        .validate()
        .context("configuration rejected")?;
    log::info!(
        "port {} @ {} baud, {} pins, Vcc {:.2} V, pulldown {} Ohm",
        config.port_name,
        config.baud_rate,
        config.num_channels,
        config.vcc,
        config.pulldown_ohms
    );
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1280.0, 800.0])
        .with_min_inner_size([960.0, 600.0])
        .with_title("FSR Scope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "FSR Scope",
        options,
        Box::new(move |_cc| Box::new(gui::FsrScopeApp::new(config))),
    )
    .map_err(|e| anyhow::anyhow!("GUI terminated: {e}"))
}
