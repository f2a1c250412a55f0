use std::fs::{self, File};
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::{Path, PathBuf};
use crate::drivers::line::{decode_line, parse_line, ParsedLine, RawSample};
use crate::drivers::AcquisitionError;
/// Append-only destination for raw device lines of recorded channels.
pub trait RecordSink {
    fn append_line(&mut self, line: &str) -> Result<(), AcquisitionError>;
}
/// Session metadata written as `;` comments at the top of every data file.
#[derive(Clone, Debug)]
pub struct RecordingHeader {
    pub sample_rate_hz: u32,
    pub vcc: f64,
    pub pulldown_ohms: f64,
    pub num_channels: usize,
}
impl RecordingHeader {
    fn lines(&self) -> [String; 3] {
        [
            format!("; Recording @ {} Hz", self.sample_rate_hz),
            format!(
                "; Vcc = {:.2} V, pulldown = {} Ohm",
                self.vcc, self.pulldown_ohms
            ),
            format!(
                "; Key: time (ms), pin (A0-{}), readout (0-1023)",
                self.num_channels.saturating_sub(1)
            ),
        ]
    }
}
pub fn data_file_name(session_start_secs: u64, recording_no: u32) -> String {
    format!("data_{session_start_secs}_{recording_no}.txt")
}
/// Sidecar annotation file paired with a data file by name substitution.
pub fn annotation_path_for(data_path: &Path) -> PathBuf {
    let name = data_path
        .file_name()
        .map(|n| n.to_string_lossy().replacen("data_", "annotations_", 1))
        .unwrap_or_else(|| "annotations.txt".to_owned());
    data_path.with_file_name(name)
}
/// Writes one recording's data file, one line per sample, flushed per line.
pub struct DataRecorder {
    path: PathBuf,
    writer: Option<LineWriter<File>>,
}
impl DataRecorder {
    pub fn create(
        data_dir: &Path,
        session_start_secs: u64,
        recording_no: u32,
        header: &RecordingHeader,
    ) -> Result<Self, AcquisitionError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(data_file_name(session_start_secs, recording_no));
        let mut writer = LineWriter::new(File::create(&path)?);
        for line in header.lines() {
            writeln!(writer, "{line}")?;
        }
        Ok(Self {
            path,
            writer: Some(writer),
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn finish(&mut self) -> Result<(), AcquisitionError> {
        if let Some(mut w) = self.writer.take() {
            w.flush().map_err(AcquisitionError::PersistenceFailure)?;
        }
        Ok(())
    }
}
impl RecordSink for DataRecorder {
    fn append_line(&mut self, line: &str) -> Result<(), AcquisitionError> {
        let w = self.writer.as_mut().ok_or_else(|| {
            AcquisitionError::PersistenceFailure(std::io::Error::other("recording already finished"))
        })?;
        writeln!(w, "{line}").map_err(AcquisitionError::PersistenceFailure)
    }
}
impl Drop for DataRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("{}: {e}", self.path.display());
        }
    }
}
#[cfg(test)]
impl RecordSink for Vec<String> {
    fn append_line(&mut self, line: &str) -> Result<(), AcquisitionError> {
        self.push(line.to_owned());
        Ok(())
    }
}
/// Loads every sample of a saved recording, skipping `;` comments, lines that
/// are not UTF-8 and any line that is not three integer fields.
pub fn read_recording(path: &Path) -> Result<Vec<RawSample>, AcquisitionError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();
    let mut bytes = Vec::new();
    loop {
        bytes.clear();
        if reader.read_until(b'\n', &mut bytes)? == 0 {
            break;
        }
        let Some(line) = decode_line(&bytes) else {
            continue;
        };
        if line.starts_with(';') {
            continue;
        }
        if let ParsedLine::Sample(s) = parse_line(line) {
            samples.push(s);
        }
    }
    Ok(samples)
}
#[cfg(test)]
mod tests {
    use super::*;
    fn header() -> RecordingHeader {
        RecordingHeader {
            sample_rate_hz: 50,
            vcc: 5.06,
            pulldown_ohms: 10000.0,
            num_channels: 6,
        }
    }
    #[test]
    fn writes_header_then_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DataRecorder::create(dir.path(), 1516706033, 2, &header()).unwrap();
        assert!(rec.path().ends_with("data_1516706033_2.txt"));
        rec.append_line("0,0,0").unwrap();
        rec.append_line("10,1,511").unwrap();
        rec.finish().unwrap();
        let text = fs::read_to_string(rec.path()).unwrap();
        assert_eq!(
            text,
            "; Recording @ 50 Hz\n\
             ; Vcc = 5.06 V, pulldown = 10000 Ohm\n\
             ; Key: time (ms), pin (A0-5), readout (0-1023)\n\
             0,0,0\n\
             10,1,511\n"
        );
        assert!(matches!(
            rec.append_line("20,0,1"),
            Err(AcquisitionError::PersistenceFailure(_))
        ));
    }
    #[test]
    fn reader_skips_comments_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_1_1.txt");
        fs::write(
            &path,
            "; Recording @ 50 Hz\n;1,2,3\n5,0,100\n\n6,0\n7,x,1\n8,1,1023\r\n",
        )
        .unwrap();
        let samples = read_recording(&path).unwrap();
        let lines: Vec<String> = samples.iter().map(RawSample::to_line).collect();
        assert_eq!(lines, vec!["5,0,100", "8,1,1023"]);
    }
    #[test]
    fn reader_skips_undecodable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_1_2.txt");
        let mut bytes = b"; Recording @ 50 Hz\n1,0,10\n".to_vec();
        bytes.extend_from_slice(b"2,0,\xff\xfe\n3,0,30\r\n4,1,40");
        fs::write(&path, bytes).unwrap();
        let lines: Vec<String> = read_recording(&path)
            .unwrap()
            .iter()
            .map(RawSample::to_line)
            .collect();
        assert_eq!(lines, vec!["1,0,10", "3,0,30", "4,1,40"]);
    }
    #[test]
    fn annotation_file_pairs_by_name() {
        let p = annotation_path_for(Path::new("sensordata/data_1541493946_2.txt"));
        assert_eq!(p, Path::new("sensordata/annotations_1541493946_2.txt"));
    }
}
