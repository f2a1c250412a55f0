use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
/// Status/log sink shared by the handshake and the acquisition loop.
pub trait Reporter {
    /// Updates the at-a-glance status indicator (also logged).
    fn status(&mut self, msg: &str);
    fn log(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
}
/// Formats an elapsed time as `h:mm:ss`.
pub fn format_running(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (m, s) = (secs / 60, secs % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{h}:{m:02}:{s:02}")
}
/// On-disk session log with an elapsed-time prefix on every line.
pub struct SessionLog {
    path: PathBuf,
    started: Instant,
    started_at: SystemTime,
}
impl SessionLog {
    /// Creates `<dir>/log_<unix secs>.txt`, truncating any previous file.
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        let started_at = SystemTime::now();
        let secs = started_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("log_{secs}.txt"));
        File::create(&path)?;
        let mut log = Self {
            path,
            started: Instant::now(),
            started_at,
        };
        let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        log.log(&format!("Logging started @ {stamp} (UTC)"));
        Ok(log)
    }
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Session start in unix seconds; recordings are named after it.
    pub fn start_secs(&self) -> u64 {
        self.started_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
    fn append(&self, msg: &str) {
        let line = format!("{} - {}\n", format_running(self.elapsed()), msg);
        let result = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            log::warn!("session log {} not writable: {e}", self.path.display());
        }
    }
}
impl Reporter for SessionLog {
    fn status(&mut self, msg: &str) {
        self.log(msg);
    }
    fn log(&mut self, msg: &str) {
        log::info!("{msg}");
        self.append(msg);
    }
    fn warn(&mut self, msg: &str) {
        log::warn!("{msg}");
        self.append(msg);
    }
}
#[cfg(test)]
#[derive(Default)]
pub struct MemoryReporter {
    pub statuses: Vec<String>,
    pub lines: Vec<String>,
}
#[cfg(test)]
impl Reporter for MemoryReporter {
    fn status(&mut self, msg: &str) {
        self.statuses.push(msg.to_owned());
        self.lines.push(msg.to_owned());
    }
    fn log(&mut self, msg: &str) {
        self.lines.push(msg.to_owned());
    }
    fn warn(&mut self, msg: &str) {
        self.lines.push(msg.to_owned());
    }
}
