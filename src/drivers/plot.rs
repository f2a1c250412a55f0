use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::annotation::Marker;
use crate::drivers::error::AcquisitionError;
use crate::drivers::line::RawSample;
use crate::drivers::pipeline::ChartFrame;
use crate::drivers::{Unit, UnitConverter};
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
        }
    }
}
impl PlotStyle {
    pub fn color(&self, channel: usize) -> RGBColor {
        self.palette[channel % self.palette.len()]
    }
}
/// One labelled line of a static chart.
struct Trace {
    label: String,
    points: Vec<(f64, f64)>,
}
/// Renders the live chart snapshot, annotation markers included.
pub fn render_frame_png(frame: &ChartFrame, style: &PlotStyle) -> Result<Vec<u8>, AcquisitionError> {
    let traces: Vec<(usize, Trace)> = frame
        .series
        .iter()
        .filter(|s| !s.points.is_empty())
        .map(|s| {
            (
                s.channel,
                Trace {
                    label: format!("A{}", s.channel),
                    points: s.points.iter().map(|p| (p[0], p[1])).collect(),
                },
            )
        })
        .collect();
    if traces.is_empty() {
        return Err(AcquisitionError::Plot("no shown channel has data".into()));
    }
    let y = frame.y_bounds.map(|b| (b.min, b.max));
    let markers: Vec<f64> = frame.markers.iter().map(|m| m.timestamp_ms as f64).collect();
    render_traces(&frame.title, frame.unit.label(), &traces, y, &markers, style)
}
/// Replays a saved recording in `unit`, one line per channel present, with
/// its annotations as vertical markers.
pub fn render_recording_png(
    samples: &[RawSample],
    markers: &[Marker],
    unit: Unit,
    converter: &UnitConverter,
    style: &PlotStyle,
) -> Result<Vec<u8>, AcquisitionError> {
    let mut channels: Vec<i64> = samples.iter().map(|s| s.channel).collect();
    channels.sort_unstable();
    channels.dedup();
    let traces: Vec<(usize, Trace)> = channels
        .into_iter()
        .filter_map(|ch| usize::try_from(ch).ok())
        .map(|ch| {
            // Averaged units replay as a running mean from the first sample.
            let mut sum = 0.0;
            let points = samples
                .iter()
                .filter(|s| s.channel == ch as i64)
                .enumerate()
                .map(|(i, s)| {
                    let value = unit.convert(s.code, converter);
                    let value = if unit.is_averaged() {
                        sum += value;
                        sum / (i + 1) as f64
                    } else {
                        value
                    };
                    (s.timestamp_ms as f64, value)
                })
                .collect();
            (
                ch,
                Trace {
                    label: format!("A{ch}"),
                    points,
                },
            )
        })
        .collect();
    if traces.is_empty() {
        return Err(AcquisitionError::Plot("recording has no samples".into()));
    }
    let markers: Vec<f64> = markers.iter().map(|m| m.timestamp_ms as f64).collect();
    render_traces("Recording", unit.label(), &traces, None, &markers, style)
}
/// Plots `unit` against every nonzero ADC code: the converter's calibration curve.
pub fn render_calibration_png(
    converter: &UnitConverter,
    unit: Unit,
    style: &PlotStyle,
) -> Result<Vec<u8>, AcquisitionError> {
    let base = unit.instantaneous();
    let points = (1..=1023)
        .map(|code| (code as f64, base.convert(code, converter)))
        .filter(|(_, v)| v.is_finite())
        .collect();
    let trace = Trace {
        label: base.label().to_owned(),
        points,
    };
    let title = format!(
        "Vcc = {:.2} V, pulldown = {} Ohm",
        converter.vcc(),
        converter.pulldown_ohms()
    );
    render_traces(&title, base.label(), &[(0, trace)], None, &[], style)
}
fn render_traces(
    title: &str,
    y_label: &str,
    traces: &[(usize, Trace)],
    y_bounds: Option<(f64, f64)>,
    markers: &[f64],
    style: &PlotStyle,
) -> Result<Vec<u8>, AcquisitionError> {
    let all = || traces.iter().flat_map(|(_, t)| t.points.iter().copied());
    let (x_min, x_max) = all().fold((f64::MAX, f64::MIN), |(lo, hi), (x, _)| (lo.min(x), hi.max(x)));
    let x_range = if x_max > x_min { x_min..x_max } else { x_min - 1.0..x_min + 1.0 };
    let (y_min, y_max) = y_bounds.unwrap_or_else(|| {
        all().fold((f64::MAX, f64::MIN), |(lo, hi), (_, y)| (lo.min(y), hi.max(y)))
    });
    let y_range = if y_max > y_min { y_min..y_max } else { y_min - 1.0..y_min + 1.0 };
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(title, ("sans-serif", 20).into_font().color(&WHITE))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x_range, y_range.clone())?;
        chart
            .configure_mesh()
            .light_line_style(&WHITE.mix(0.1))
            .y_desc(y_label)
            .label_style(("sans-serif", 12).into_font().color(&WHITE))
            .draw()?;
        for (channel, trace) in traces {
            let color = style.color(*channel);
            chart
                .draw_series(LineSeries::new(trace.points.iter().copied(), &color))?
                .label(trace.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        for &x in markers {
            chart.draw_series(LineSeries::new(
                [(x, y_range.start), (x, y_range.end)],
                &WHITE.mix(0.6),
            ))?;
        }
        chart
            .configure_series_labels()
            .border_style(&WHITE.mix(0.2))
            .background_style(&style.background)
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
pub fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, AcquisitionError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AcquisitionError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
