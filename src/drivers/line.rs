/// Out-of-band control line the device sends once its self-test is done.
pub const INIT_COMPLETE: &str = "INIT_COMPLETE";
/// One `timestamp,channel,code` record exactly as the device sent it.
///
/// Values are verbatim: range checks belong to whoever consumes the sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawSample {
    pub timestamp_ms: i64,
    pub channel: i64,
    pub code: i64,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedLine {
    Sample(RawSample),
    /// Wrong field count; happens at stream boundaries and is dropped silently.
    Incomplete,
    /// Three fields, but not all of them integers.
    Malformed(String),
}
/// Parses a newline-stripped line from the device.
pub fn parse_line(line: &str) -> ParsedLine {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 3 {
        return ParsedLine::Incomplete;
    }
    let parsed: Result<Vec<i64>, _> = fields.iter().map(|f| f.trim().parse::<i64>()).collect();
    match parsed.as_deref() {
        Ok(&[timestamp_ms, channel, code]) => ParsedLine::Sample(RawSample {
            timestamp_ms,
            channel,
            code,
        }),
        _ => ParsedLine::Malformed(line.to_owned()),
    }
}
/// Strips the line terminator (`\n` or `\r\n`) and decodes as UTF-8.
pub fn decode_line(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes)
        .ok()
        .map(|s| s.trim_end_matches(|c: char| c == '\r' || c == '\n'))
}
impl RawSample {
    /// Wire form, identical to what the device sends.
    #[cfg(test)]
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.timestamp_ms, self.channel, self.code)
    }
}
