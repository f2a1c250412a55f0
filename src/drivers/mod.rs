// src/drivers/mod.rs
// 采集链路：串口 → 解析 → 换算 → 缓冲 → 绘图
pub mod buffer;
pub mod convert;
pub mod error;
pub mod handshake;
pub mod line;
pub mod pipeline;
pub mod plot;
pub mod simulator;
pub mod source;
pub mod view;
// 公开导出常用类型，方便外部调用
pub use convert::{Unit, UnitConverter};
pub use error::AcquisitionError;
pub use handshake::{establish, ConnectionState, HandshakeController};
pub use pipeline::{AcquisitionLoop, ChartFrame, EventPump, Renderer, SessionCommand};
pub use plot::{render_calibration_png, render_frame_png, render_recording_png, PlotStyle};
pub use simulator::SimulatedOpener;
pub use source::{PortOpener, SerialOpener};
pub use view::{parse_bound, ViewState};
