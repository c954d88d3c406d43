//! Figure data captured from a plot snippet

use serde::Serialize;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Pixels per inch when translating `figsize`
pub const DPI: f64 = 80.0;

/// matplotlib's default `tab10` property cycle
pub const COLOR_CYCLE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Line,
    Scatter,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
    None,
}

impl LineStyle {
    /// SVG `stroke-dasharray`, if any
    pub fn dash_array(self) -> Option<&'static str> {
        match self {
            LineStyle::Dashed => Some("6,4"),
            LineStyle::Dotted => Some("1.5,3"),
            LineStyle::DashDot => Some("6,3,1.5,3"),
            LineStyle::Solid | LineStyle::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Circle,
    Point,
    Square,
    Triangle,
    Diamond,
    Cross,
    Plus,
    Star,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    pub color: String,
    pub line_style: LineStyle,
    pub line_width: f64,
    pub marker: Option<Marker>,
    pub marker_size: f64,
    pub alpha: f64,
}

impl Style {
    pub fn line(color: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            line_style: LineStyle::Solid,
            line_width: 1.5,
            marker: None,
            marker_size: 6.0,
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub kind: SeriesKind,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Lower edge of a filled region
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub style: Style,
}

impl Series {
    pub fn has_finite_point(&self) -> bool {
        self.x
            .iter()
            .zip(&self.y)
            .any(|(x, y)| x.is_finite() && y.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// `axhline` / `axvline`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub orientation: Orientation,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub style: Style,
}

/// User-fixed axis bounds; a missing side is computed from the data
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AxisRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axes {
    pub title: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub xlim: AxisRange,
    pub ylim: AxisRange,
    pub grid: bool,
    pub legend: bool,
    pub series: Vec<Series>,
    pub reference_lines: Vec<ReferenceLine>,
    #[serde(skip)]
    cycle_position: usize,
}

impl Axes {
    /// Next colour from the property cycle
    pub fn next_color(&mut self) -> String {
        let color = COLOR_CYCLE[self.cycle_position % COLOR_CYCLE.len()];
        self.cycle_position += 1;
        color.to_string()
    }

    /// True once something visible was drawn: a finite data point or a
    /// finite reference line
    pub fn has_content(&self) -> bool {
        self.series.iter().any(Series::has_finite_point)
            || self.reference_lines.iter().any(|line| line.value.is_finite())
    }
}

/// The single figure/axes pair a snippet draws on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub axes: Axes,
}

impl Default for Figure {
    fn default() -> Self {
        Self::new()
    }
}

impl Figure {
    pub fn new() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            title: None,
            axes: Axes::default(),
        }
    }

    /// Resize from a matplotlib `figsize` in inches, clamped to sane pixels
    pub fn set_size_inches(&mut self, width: f64, height: f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let to_px = |inches: f64| (inches * DPI).clamp(160.0, 1600.0).round() as u32;
        if width.is_finite() && height.is_finite() {
            self.width = to_px(width);
            self.height = to_px(height);
        }
    }

    pub fn has_content(&self) -> bool {
        self.axes.has_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_cycle_wraps() {
        let mut axes = Axes::default();
        let first = axes.next_color();
        for _ in 1..COLOR_CYCLE.len() {
            axes.next_color();
        }
        assert_eq!(axes.next_color(), first);
    }

    #[test]
    fn test_figsize_is_clamped() {
        let mut figure = Figure::new();
        figure.set_size_inches(10.0, 6.0);
        assert_eq!((figure.width, figure.height), (800, 480));
        figure.set_size_inches(1000.0, 0.1);
        assert_eq!((figure.width, figure.height), (1600, 160));
        figure.set_size_inches(f64::NAN, 3.0);
        assert_eq!((figure.width, figure.height), (1600, 160));
    }

    #[test]
    fn test_empty_figure_has_no_content() {
        assert!(!Figure::new().has_content());
    }

    fn series(x: Vec<f64>, y: Vec<f64>) -> Series {
        Series {
            kind: SeriesKind::Line,
            x,
            y,
            baseline: None,
            label: None,
            style: Style::line("#1f77b4"),
        }
    }

    #[test]
    fn test_content_needs_a_finite_point() {
        let mut figure = Figure::new();
        figure.axes.series.push(series(vec![], vec![]));
        figure.axes.series.push(series(vec![0.0, 1.0], vec![f64::NAN, f64::INFINITY]));
        assert!(!figure.has_content());

        figure.axes.reference_lines.push(ReferenceLine {
            orientation: Orientation::Horizontal,
            value: f64::NAN,
            label: None,
            style: Style::line("#000000"),
        });
        assert!(!figure.has_content());

        figure.axes.series.push(series(vec![f64::NAN, 2.0], vec![1.0, 3.0]));
        assert!(figure.has_content());
    }
}
