use std::collections::BTreeSet;
use std::time::Duration;
use crate::drivers::Unit;
/// Relative headroom added to auto-scaled y bounds.
const AUTOSCALE_MARGIN: f64 = 0.05;
/// Which buffers a [`ViewState`] change invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferReset {
    None,
    Channel(usize),
    All,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YBounds {
    pub min: f64,
    pub max: f64,
}
/// User-controlled display parameters.
///
/// Every mutation goes through a setter that reports the buffer reset it
/// requires, so values converted under a stale unit are never charted.
#[derive(Clone, Debug)]
pub struct ViewState {
    refresh_interval: Duration,
    buffer_depth: usize,
    y_min: Option<f64>,
    y_max: Option<f64>,
    unit: Unit,
    shown: BTreeSet<usize>,
    recorded: BTreeSet<usize>,
}
impl Default for ViewState {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), 1000, Unit::Raw)
    }
}
impl ViewState {
    pub fn new(refresh_interval: Duration, buffer_depth: usize, unit: Unit) -> Self {
        Self {
            refresh_interval,
            buffer_depth: buffer_depth.max(1),
            y_min: None,
            y_max: None,
            unit,
            shown: BTreeSet::new(),
            recorded: BTreeSet::new(),
        }
    }
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
    pub fn buffer_depth(&self) -> usize {
        self.buffer_depth
    }
    pub fn unit(&self) -> Unit {
        self.unit
    }
    pub fn is_shown(&self, channel: usize) -> bool {
        self.shown.contains(&channel)
    }
    pub fn is_recorded(&self, channel: usize) -> bool {
        self.recorded.contains(&channel)
    }
    pub fn shown_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.shown.iter().copied()
    }
    pub fn recorded_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.recorded.iter().copied()
    }
    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.refresh_interval = interval;
    }
    pub fn set_buffer_depth(&mut self, depth: usize) {
        self.buffer_depth = depth.max(1);
    }
    pub fn set_y_bounds(&mut self, min: Option<f64>, max: Option<f64>) {
        self.y_min = min.filter(|v| v.is_finite());
        self.y_max = max.filter(|v| v.is_finite());
    }
    pub fn set_unit(&mut self, unit: Unit) -> BufferReset {
        if self.unit == unit {
            return BufferReset::None;
        }
        self.unit = unit;
        BufferReset::All
    }
    pub fn set_channel_shown(&mut self, channel: usize, shown: bool) -> BufferReset {
        let changed = if shown {
            self.shown.insert(channel)
        } else {
            self.shown.remove(&channel)
        };
        if changed {
            BufferReset::Channel(channel)
        } else {
            BufferReset::None
        }
    }
    /// Returns true when the recorded set actually changed.
    pub fn set_channel_recorded(&mut self, channel: usize, recorded: bool) -> bool {
        if recorded {
            self.recorded.insert(channel)
        } else {
            self.recorded.remove(&channel)
        }
    }
    /// Resolves the y axis from the data range of the shown channels, with each
    /// end independently overridden by an explicit user bound.
    pub fn y_bounds(&self, data: Option<(f64, f64)>) -> Option<YBounds> {
        let auto_min = data.map(|(lo, _)| lo - margin(lo));
        let auto_max = data.map(|(_, hi)| hi + margin(hi));
        let min = self.y_min.or(auto_min)?;
        let max = self.y_max.or(auto_max)?;
        (min < max).then_some(YBounds { min, max })
    }
}
fn margin(edge: f64) -> f64 {
    let base = if edge > 0.0 { edge } else { 1.0 };
    base * AUTOSCALE_MARGIN
}
/// Parses a bound typed by the user; empty or non-numeric means "auto".
pub fn parse_bound(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn unit_change_resets_everything_once() {
        let mut view = ViewState::default();
        assert_eq!(view.set_unit(Unit::Raw), BufferReset::None);
        assert_eq!(view.set_unit(Unit::Force), BufferReset::All);
        assert_eq!(view.unit(), Unit::Force);
    }
    #[test]
    fn toggling_shown_resets_only_that_channel() {
        let mut view = ViewState::default();
        assert_eq!(view.set_channel_shown(2, true), BufferReset::Channel(2));
        assert_eq!(view.set_channel_shown(2, true), BufferReset::None);
        assert!(view.is_shown(2));
        assert_eq!(view.set_channel_shown(2, false), BufferReset::Channel(2));
        assert!(!view.is_shown(2));
    }
    #[test]
    fn recorded_set_reports_changes() {
        let mut view = ViewState::default();
        assert!(view.set_channel_recorded(0, true));
        assert!(!view.set_channel_recorded(0, true));
        assert!(view.set_channel_recorded(3, true));
        assert_eq!(view.recorded_channels().collect::<Vec<_>>(), vec![0, 3]);
    }
    #[test]
    fn auto_bounds_pad_five_percent() {
        let view = ViewState::default();
        let b = view.y_bounds(Some((100.0, 200.0))).unwrap();
        assert!((b.min - 95.0).abs() < 1e-9);
        assert!((b.max - 210.0).abs() < 1e-9);
        // Non-positive ends pad by a fixed 0.05.
        let b = view.y_bounds(Some((0.0, 0.0))).unwrap();
        assert!((b.min + 0.05).abs() < 1e-12);
        assert!((b.max - 0.05).abs() < 1e-12);
        assert_eq!(view.y_bounds(None), None);
    }
    #[test]
    fn explicit_bounds_override_each_end() {
        let mut view = ViewState::default();
        view.set_y_bounds(Some(-10.0), None);
        let b = view.y_bounds(Some((0.0, 500.0))).unwrap();
        assert_eq!(b.min, -10.0);
        assert!((b.max - 525.0).abs() < 1e-9);
        view.set_y_bounds(None, Some(1023.0));
        let b = view.y_bounds(Some((10.0, 500.0))).unwrap();
        assert!((b.min - 9.5).abs() < 1e-9);
        assert_eq!(b.max, 1023.0);
        view.set_y_bounds(Some(0.0), Some(1023.0));
        assert_eq!(view.y_bounds(None), Some(YBounds { min: 0.0, max: 1023.0 }));
        view.set_y_bounds(Some(5.0), Some(1.0));
        assert_eq!(view.y_bounds(Some((0.0, 1.0))), None);
    }
    #[test]
    fn bound_text_parsing() {
        assert_eq!(parse_bound(""), None);
        assert_eq!(parse_bound(" 12 "), Some(12.0));
        assert_eq!(parse_bound("-0.5"), Some(-0.5));
        assert_eq!(parse_bound("abc"), None);
        assert_eq!(parse_bound("inf"), None);
    }
}
