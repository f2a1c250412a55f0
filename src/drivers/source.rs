use std::io::{self, Read};
use std::time::Duration;
use crate::drivers::AcquisitionError;
/// Longest run of bytes kept while waiting for a newline.
const MAX_PENDING_BYTES: usize = 4096;
/// Line-oriented byte transport from the device.
///
/// `read_line` may block up to the transport's read timeout. `Ok(None)` means
/// the timeout elapsed without a complete line; it is not an error. Dropping
/// the source closes the underlying port.
pub trait LineSource {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;
}
/// Something that can (re)open the device link.
pub trait PortOpener {
    fn port_name(&self) -> &str;
    fn open(&mut self) -> Result<Box<dyn LineSource + Send>, AcquisitionError>;
}
/// Serial port wrapped with a newline splitter.
pub struct SerialLink {
    port_name: String,
    port: Box<dyn serialport::SerialPort>,
    pending: Vec<u8>,
}
impl SerialLink {
    pub fn open(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, AcquisitionError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| AcquisitionError::PortUnavailable {
                port: port_name.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            port_name: port_name.to_owned(),
            port,
            pending: Vec::with_capacity(64),
        })
    }
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        Some(self.pending.drain(..=pos).collect())
    }
}
impl LineSource for SerialLink {
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if self.pending.len() > MAX_PENDING_BYTES && !chunk[..n].contains(&b'\n') {
                        log::warn!(
                            "{}: dropping {} bytes without a line break",
                            self.port_name,
                            self.pending.len()
                        );
                        self.pending.clear();
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}
impl Drop for SerialLink {
    fn drop(&mut self) {
        log::debug!("closing serial port {}", self.port_name);
    }
}
pub struct SerialOpener {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
}
impl SerialOpener {
    pub fn new(port_name: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            read_timeout,
        }
    }
}
impl PortOpener for SerialOpener {
    fn port_name(&self) -> &str {
        &self.port_name
    }
    fn open(&mut self) -> Result<Box<dyn LineSource + Send>, AcquisitionError> {
        let link = SerialLink::open(&self.port_name, self.baud_rate, self.read_timeout)?;
        Ok(Box::new(link))
    }
}
#[cfg(test)]
pub use scripted::{ScriptStep, ScriptedOpener, ScriptedSource};
