//! SVG export of a captured figure
//!
//! Produces a self-contained document the browser can inline. Layout is
//! fixed-margin: one plot area, five-ish ticks per axis, optional grid and
//! legend. Non-finite points break lines instead of being drawn.

use super::figure::{
    Axes, AxisRange, Figure, LineStyle, Marker, Orientation, ReferenceLine, Series, SeriesKind,
    Style,
};
use std::fmt::Write;

const MARGIN_LEFT: f64 = 72.0;
const MARGIN_RIGHT: f64 = 24.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 56.0;
const SUPTITLE_HEIGHT: f64 = 24.0;
const TICK_COUNT: usize = 5;
const TICK_LENGTH: f64 = 5.0;
const FONT: &str = "DejaVu Sans, Helvetica, Arial, sans-serif";

/// Fraction of the data span added on auto-scaled sides
const AUTO_MARGIN: f64 = 0.05;

/// Data-space bounds of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    min: f64,
    max: f64,
}

impl Span {
    fn len(self) -> f64 {
        self.max - self.min
    }
}

/// Maps data coordinates onto the plot area
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    x: Span,
    y: Span,
}

impl Frame {
    fn px(&self, x: f64) -> f64 {
        self.left + (x - self.x.min) / self.x.len() * self.width
    }

    fn py(&self, y: f64) -> f64 {
        self.top + self.height - (y - self.y.min) / self.y.len() * self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

pub fn to_svg(figure: &Figure) -> String {
    let width = f64::from(figure.width);
    let height = f64::from(figure.height);
    let axes = &figure.axes;
    let top = MARGIN_TOP + if figure.title.is_some() { SUPTITLE_HEIGHT } else { 0.0 };

    let frame = Frame {
        left: MARGIN_LEFT,
        top,
        width: (width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
        height: (height - top - MARGIN_BOTTOM).max(1.0),
        x: resolve_span(axis_values(axes, Orientation::Vertical), axes.xlim),
        y: resolve_span(axis_values(axes, Orientation::Horizontal), axes.ylim),
    };

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="{FONT}" font-size="12">"#,
        w = figure.width,
        h = figure.height,
    );
    let _ = write!(
        svg,
        r##"<rect width="100%" height="100%" fill="#ffffff"/><defs><clipPath id="plot-area"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath></defs>"##,
        num(frame.left),
        num(frame.top),
        num(frame.width),
        num(frame.height),
    );

    write_ticks(&mut svg, &frame, axes.grid);

    svg.push_str(r#"<g clip-path="url(#plot-area)">"#);
    for series in &axes.series {
        write_series(&mut svg, &frame, series);
    }
    for line in &axes.reference_lines {
        write_reference_line(&mut svg, &frame, line);
    }
    svg.push_str("</g>");

    let _ = write!(
        svg,
        r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#000000" stroke-width="1"/>"##,
        num(frame.left),
        num(frame.top),
        num(frame.width),
        num(frame.height),
    );

    write_labels(&mut svg, &frame, figure);
    if axes.legend {
        write_legend(&mut svg, &frame, axes);
    }

    svg.push_str("</svg>");
    svg
}

/// Finite data along one axis; reference lines of the other orientation
/// contribute their position
fn axis_values(axes: &Axes, across: Orientation) -> Vec<f64> {
    let mut values = Vec::new();
    for series in &axes.series {
        match across {
            Orientation::Vertical => values.extend(&series.x),
            Orientation::Horizontal => {
                values.extend(&series.y);
                if let Some(baseline) = &series.baseline {
                    values.extend(baseline);
                }
            }
        }
    }
    values.extend(
        axes.reference_lines
            .iter()
            .filter(|line| line.orientation == across)
            .map(|line| line.value),
    );
    values.retain(|v| v.is_finite());
    values
}

fn resolve_span(values: Vec<f64>, fixed: AxisRange) -> Span {
    let (mut min, mut max) = values
        .into_iter()
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 1.0));

    if max - min <= f64::EPSILON * max.abs().max(1.0) {
        let pad = if min.abs() > 0.0 { min.abs() * 0.1 } else { 0.5 };
        min -= pad;
        max += pad;
    } else {
        let pad = (max - min) * AUTO_MARGIN;
        min -= pad;
        max += pad;
    }

    let min = fixed.min.unwrap_or(min);
    let max = fixed.max.unwrap_or(max);
    if max > min {
        Span { min, max }
    } else if max < min {
        // Inverted limits render in ascending order
        Span { min: max, max: min }
    } else {
        Span {
            min: min - 0.5,
            max: max + 0.5,
        }
    }
}

/// Round a span to 1, 2, 2.5 or 5 times a power of ten
fn nice_step(span: f64, count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let raw = span / count.saturating_sub(1).max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 2.5 {
        2.5
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn ticks(span: Span) -> (Vec<f64>, f64) {
    let step = nice_step(span.len(), TICK_COUNT);
    if !step.is_finite() || step <= 0.0 {
        return (vec![span.min, span.max], span.len());
    }
    let first = (span.min / step).ceil() * step;
    let ticks = (0..50)
        .map(|i| first + step * f64::from(i))
        .take_while(|tick| *tick <= span.max + step * 1e-9)
        // Avoid "-0"
        .map(|tick| if tick.abs() < step * 1e-9 { 0.0 } else { tick })
        .collect();
    (ticks, step)
}

fn tick_label(value: f64, step: f64) -> String {
    let magnitude = value.abs().max(step);
    if magnitude >= 1e6 || magnitude < 1e-4 {
        return format!("{value:.1e}");
    }
    // Enough decimals to tell neighbouring ticks apart
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 6 && (scaled - scaled.round()).abs() > 1e-6 * scaled.abs().max(1.0) {
        scaled *= 10.0;
        decimals += 1;
    }
    format!("{value:.decimals$}")
}

fn write_ticks(svg: &mut String, frame: &Frame, grid: bool) {
    let (x_ticks, x_step) = ticks(frame.x);
    for x in x_ticks {
        let px = num(frame.px(x));
        if grid {
            let _ = write!(
                svg,
                r##"<line x1="{px}" y1="{}" x2="{px}" y2="{}" stroke="#b0b0b0" stroke-width="0.8" stroke-opacity="0.6"/>"##,
                num(frame.top),
                num(frame.bottom()),
            );
        }
        let _ = write!(
            svg,
            r##"<line x1="{px}" y1="{}" x2="{px}" y2="{}" stroke="#000000"/><text x="{px}" y="{}" text-anchor="middle">{}</text>"##,
            num(frame.bottom()),
            num(frame.bottom() + TICK_LENGTH),
            num(frame.bottom() + TICK_LENGTH + 14.0),
            escape(&tick_label(x, x_step)),
        );
    }

    let (y_ticks, y_step) = ticks(frame.y);
    for y in y_ticks {
        let py = num(frame.py(y));
        if grid {
            let _ = write!(
                svg,
                r##"<line x1="{}" y1="{py}" x2="{}" y2="{py}" stroke="#b0b0b0" stroke-width="0.8" stroke-opacity="0.6"/>"##,
                num(frame.left),
                num(frame.right()),
            );
        }
        let _ = write!(
            svg,
            r##"<line x1="{}" y1="{py}" x2="{}" y2="{py}" stroke="#000000"/><text x="{}" y="{py}" text-anchor="end" dominant-baseline="middle">{}</text>"##,
            num(frame.left - TICK_LENGTH),
            num(frame.left),
            num(frame.left - TICK_LENGTH - 3.0),
            escape(&tick_label(y, y_step)),
        );
    }
}

fn stroke_attrs(style: &Style) -> String {
    let mut attrs = format!(
        r#"stroke="{}" stroke-width="{}""#,
        style.color,
        num(style.line_width)
    );
    if let Some(dash) = style.line_style.dash_array() {
        let _ = write!(attrs, r#" stroke-dasharray="{dash}""#);
    }
    if style.alpha < 1.0 {
        let _ = write!(attrs, r#" stroke-opacity="{}""#, num(style.alpha));
    }
    attrs
}

/// Runs of consecutive finite points
fn finite_runs(frame: &Frame, x: &[f64], y: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (&x, &y) in x.iter().zip(y) {
        if x.is_finite() && y.is_finite() {
            current.push((frame.px(x), frame.py(y)));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn points_attr(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{},{}", num(*x), num(*y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_series(svg: &mut String, frame: &Frame, series: &Series) {
    let style = &series.style;
    match series.kind {
        SeriesKind::Line => {
            if style.line_style != LineStyle::None {
                for run in finite_runs(frame, &series.x, &series.y) {
                    let _ = write!(
                        svg,
                        r#"<polyline points="{}" fill="none" {} stroke-linejoin="round"/>"#,
                        points_attr(&run),
                        stroke_attrs(style),
                    );
                }
            }
            if let Some(marker) = style.marker {
                write_markers(svg, frame, series, marker);
            }
        }
        SeriesKind::Scatter => {
            write_markers(svg, frame, series, style.marker.unwrap_or(Marker::Circle));
        }
        SeriesKind::Fill => {
            let lower = series
                .baseline
                .clone()
                .unwrap_or_else(|| vec![0.0; series.x.len()]);
            for run in fill_runs(frame, &series.x, &series.y, &lower) {
                let _ = write!(
                    svg,
                    r#"<polygon points="{}" fill="{}" fill-opacity="{}" stroke="none"/>"#,
                    points_attr(&run),
                    style.color,
                    num(style.alpha),
                );
            }
        }
    }
}

/// Closed outlines between `upper` and `lower`, split at non-finite points
fn fill_runs(frame: &Frame, x: &[f64], upper: &[f64], lower: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut top = Vec::new();
    let mut bottom = Vec::new();
    let mut flush = |top: &mut Vec<(f64, f64)>, bottom: &mut Vec<(f64, f64)>| {
        if top.len() > 1 {
            let mut outline = std::mem::take(top);
            outline.extend(bottom.drain(..).rev());
            runs.push(outline);
        }
        top.clear();
        bottom.clear();
    };
    for ((&x, &hi), &lo) in x.iter().zip(upper).zip(lower) {
        if x.is_finite() && hi.is_finite() && lo.is_finite() {
            top.push((frame.px(x), frame.py(hi)));
            bottom.push((frame.px(x), frame.py(lo)));
        } else {
            flush(&mut top, &mut bottom);
        }
    }
    flush(&mut top, &mut bottom);
    runs
}

fn write_markers(svg: &mut String, frame: &Frame, series: &Series, marker: Marker) {
    let style = &series.style;
    let r = (style.marker_size / 2.0).max(1.0);
    let opacity = if style.alpha < 1.0 {
        format!(r#" fill-opacity="{}""#, num(style.alpha))
    } else {
        String::new()
    };
    let _ = write!(svg, r#"<g fill="{}" stroke="{}"{opacity}>"#, style.color, style.color);
    for (&x, &y) in series.x.iter().zip(&series.y) {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let (cx, cy) = (frame.px(x), frame.py(y));
        write_marker(svg, marker, cx, cy, r);
    }
    svg.push_str("</g>");
}

fn write_marker(svg: &mut String, marker: Marker, cx: f64, cy: f64, r: f64) {
    let polygon = |svg: &mut String, points: &[(f64, f64)]| {
        let _ = write!(svg, r#"<polygon points="{}"/>"#, points_attr(points));
    };
    match marker {
        Marker::Circle => {
            let _ = write!(svg, r#"<circle cx="{}" cy="{}" r="{}"/>"#, num(cx), num(cy), num(r));
        }
        Marker::Point => {
            let _ = write!(
                svg,
                r#"<circle cx="{}" cy="{}" r="{}"/>"#,
                num(cx),
                num(cy),
                num(r / 2.0)
            );
        }
        Marker::Square => {
            let _ = write!(
                svg,
                r#"<rect x="{}" y="{}" width="{}" height="{}"/>"#,
                num(cx - r),
                num(cy - r),
                num(2.0 * r),
                num(2.0 * r)
            );
        }
        Marker::Triangle => polygon(svg, &[(cx, cy - r), (cx + r, cy + r), (cx - r, cy + r)]),
        Marker::Diamond => polygon(svg, &[(cx, cy - r), (cx + r, cy), (cx, cy + r), (cx - r, cy)]),
        Marker::Star => {
            let points: Vec<(f64, f64)> = (0..10)
                .map(|i| {
                    let radius = if i % 2 == 0 { r * 1.2 } else { r * 0.5 };
                    let angle = std::f64::consts::PI / 5.0 * f64::from(i) - std::f64::consts::FRAC_PI_2;
                    (cx + radius * angle.cos(), cy + radius * angle.sin())
                })
                .collect();
            polygon(svg, &points);
        }
        Marker::Plus => {
            let _ = write!(
                svg,
                r#"<path d="M{} {}H{}M{} {}V{}" fill="none" stroke-width="1.5"/>"#,
                num(cx - r),
                num(cy),
                num(cx + r),
                num(cx),
                num(cy - r),
                num(cy + r)
            );
        }
        Marker::Cross => {
            let _ = write!(
                svg,
                r#"<path d="M{} {}L{} {}M{} {}L{} {}" fill="none" stroke-width="1.5"/>"#,
                num(cx - r),
                num(cy - r),
                num(cx + r),
                num(cy + r),
                num(cx - r),
                num(cy + r),
                num(cx + r),
                num(cy - r)
            );
        }
    }
}

fn write_reference_line(svg: &mut String, frame: &Frame, line: &ReferenceLine) {
    if !line.value.is_finite() {
        return;
    }
    let (x1, y1, x2, y2) = match line.orientation {
        Orientation::Horizontal => {
            let y = frame.py(line.value);
            (frame.left, y, frame.right(), y)
        }
        Orientation::Vertical => {
            let x = frame.px(line.value);
            (x, frame.top, x, frame.bottom())
        }
    };
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {}/>"#,
        num(x1),
        num(y1),
        num(x2),
        num(y2),
        stroke_attrs(&line.style),
    );
}

fn write_labels(svg: &mut String, frame: &Frame, figure: &Figure) {
    let center_x = num(frame.left + frame.width / 2.0);
    if let Some(title) = &figure.title {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="16">{}</text>"#,
            num(f64::from(figure.width) / 2.0),
            num(MARGIN_TOP - 6.0),
            escape(title),
        );
    }
    let axes = &figure.axes;
    if let Some(title) = &axes.title {
        let _ = write!(
            svg,
            r#"<text x="{center_x}" y="{}" text-anchor="middle" font-size="14">{}</text>"#,
            num(frame.top - 10.0),
            escape(title),
        );
    }
    if let Some(xlabel) = &axes.xlabel {
        let _ = write!(
            svg,
            r#"<text x="{center_x}" y="{}" text-anchor="middle">{}</text>"#,
            num(frame.bottom() + 40.0),
            escape(xlabel),
        );
    }
    if let Some(ylabel) = &axes.ylabel {
        let x = num(18.0);
        let y = num(frame.top + frame.height / 2.0);
        let _ = write!(
            svg,
            r#"<text x="{x}" y="{y}" text-anchor="middle" transform="rotate(-90 {x} {y})">{}</text>"#,
            escape(ylabel),
        );
    }
}

/// Legend entry: label plus how to draw its swatch
struct LegendEntry<'a> {
    label: &'a str,
    style: &'a Style,
    kind: SeriesKind,
}

fn write_legend(svg: &mut String, frame: &Frame, axes: &Axes) {
    let entries: Vec<LegendEntry> = axes
        .series
        .iter()
        .filter_map(|s| {
            s.label.as_deref().map(|label| LegendEntry {
                label,
                style: &s.style,
                kind: s.kind,
            })
        })
        .chain(axes.reference_lines.iter().filter_map(|line| {
            line.label.as_deref().map(|label| LegendEntry {
                label,
                style: &line.style,
                kind: SeriesKind::Line,
            })
        }))
        .collect();
    if entries.is_empty() {
        return;
    }

    let longest = entries
        .iter()
        .map(|e| e.label.chars().count())
        .max()
        .unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let box_width = 44.0 + longest as f64 * 7.0;
    #[allow(clippy::cast_precision_loss)]
    let box_height = 8.0 + entries.len() as f64 * 18.0;
    let x = frame.right() - box_width - 8.0;
    let y = frame.top + 8.0;
    let _ = write!(
        svg,
        r##"<g class="legend"><rect x="{}" y="{}" width="{}" height="{}" fill="#ffffff" fill-opacity="0.8" stroke="#cccccc" rx="3"/>"##,
        num(x),
        num(y),
        num(box_width),
        num(box_height),
    );
    for (i, entry) in entries.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let row = y + 13.0 + i as f64 * 18.0;
        match entry.kind {
            SeriesKind::Line if entry.style.line_style != LineStyle::None => {
                let _ = write!(
                    svg,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" {}/>"#,
                    num(x + 8.0),
                    num(row),
                    num(x + 32.0),
                    num(row),
                    stroke_attrs(entry.style),
                );
            }
            SeriesKind::Fill => {
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="24" height="10" fill="{}" fill-opacity="{}"/>"#,
                    num(x + 8.0),
                    num(row - 5.0),
                    entry.style.color,
                    num(entry.style.alpha),
                );
            }
            SeriesKind::Line | SeriesKind::Scatter => {
                let _ = write!(svg, r#"<g fill="{0}" stroke="{0}">"#, entry.style.color);
                let marker = entry.style.marker.unwrap_or(Marker::Circle);
                write_marker(svg, marker, x + 20.0, row, 3.5);
                svg.push_str("</g>");
            }
        }
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" dominant-baseline="middle">{}</text>"#,
            num(x + 38.0),
            num(row),
            escape(entry.label),
        );
    }
    svg.push_str("</g>");
}

/// Coordinates with two decimals, trailing zeros dropped
fn num(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
