// src/types.rs
use std::sync::{Arc, Mutex};
use crate::drivers::{ChartFrame, ConnectionState, SessionCommand};

// 连接模式
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}

// GUI 发给后台的命令
// 停止录制不走这里：GUI 直接清除共享的 recording 标志
#[derive(Clone, Debug)]
pub enum GuiCommand {
    StartRecording(ConnectionMode),
    View(SessionCommand),
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    Status(String),
    Connection(ConnectionState),
    RecordingStatus(bool),
}

// 图表快照只保留最新一帧：后台覆盖写入，GUI 取走
// GUI 暂停刷新时旧帧被直接覆盖，不会堆积
#[derive(Clone, Default)]
pub struct FrameSlot(Arc<Mutex<Option<ChartFrame>>>);

impl FrameSlot {
    pub fn publish(&self, frame: ChartFrame) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(frame);
        }
    }

    pub fn take(&self) -> Option<ChartFrame> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}
