//! The plotting namespace: `plt`, the axes handle, and the figure handle
//!
//! Everything draws onto the single pre-built figure. `subplots`, `figure`,
//! `gca`, and `gcf` hand back the existing handles instead of allocating.

use super::args::Args;
use super::budget::Budget;
use super::value::{Namespace, Value};
use super::ScriptError;
use crate::render::{
    AxisRange, Figure, LineStyle, Marker, Orientation, ReferenceLine, Series, SeriesKind, Style,
    COLOR_CYCLE,
};

pub const PYPLOT_FUNCTIONS: &[&str] = &[
    "subplots", "figure", "gca", "gcf", "show", "close", "tight_layout", "savefig", "suptitle",
    "plot", "scatter", "fill_between", "title", "xlabel", "ylabel", "xlim", "ylim", "grid",
    "legend", "axhline", "axvline",
];

pub const AXES_METHODS: &[&str] = &[
    "plot", "scatter", "fill_between", "set_title", "set_xlabel", "set_ylabel", "set_xlim",
    "set_ylim", "grid", "legend", "axhline", "axvline", "set_aspect",
];

pub const FIGURE_METHODS: &[&str] = &[
    "suptitle", "tight_layout", "savefig", "show", "set_size_inches", "add_subplot", "gca",
];

pub fn lookup(namespace: Namespace, name: &str) -> Option<Value> {
    let table = match namespace {
        Namespace::Pyplot => PYPLOT_FUNCTIONS,
        Namespace::Axes => AXES_METHODS,
        Namespace::Figure => FIGURE_METHODS,
        Namespace::Builtins | Namespace::Numpy => return None,
    };
    table
        .iter()
        .copied()
        .find(|f| *f == name)
        .map(|f| Value::Function(namespace, f))
}

// ============================================================================
// Style parsing
// ============================================================================

const SHORT_COLORS: &[(char, &str)] = &[
    ('b', "#1f77b4"),
    ('g', "#2ca02c"),
    ('r', "#d62728"),
    ('c', "#17becf"),
    ('m', "#e377c2"),
    ('y', "#bcbd22"),
    ('k', "#000000"),
    ('w', "#ffffff"),
];

fn marker_for(c: char) -> Option<Marker> {
    Some(match c {
        'o' => Marker::Circle,
        '.' => Marker::Point,
        's' => Marker::Square,
        '^' | 'v' | '<' | '>' => Marker::Triangle,
        'D' | 'd' => Marker::Diamond,
        'x' => Marker::Cross,
        '+' => Marker::Plus,
        '*' => Marker::Star,
        _ => return None,
    })
}

/// Parts of a matplotlib format string such as `"r--"` or `"bo"`
#[derive(Debug, Default, PartialEq)]
struct Format {
    color: Option<String>,
    line_style: Option<LineStyle>,
    marker: Option<Marker>,
}

fn parse_format(fmt: &str) -> Result<Format, ScriptError> {
    let mut format = Format::default();
    let chars: Vec<char> = fmt.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c == '-' && next == Some('-') {
            format.line_style = Some(LineStyle::Dashed);
            i += 2;
        } else if c == '-' && next == Some('.') {
            format.line_style = Some(LineStyle::DashDot);
            i += 2;
        } else if c == '-' {
            format.line_style = Some(LineStyle::Solid);
            i += 1;
        } else if c == ':' {
            format.line_style = Some(LineStyle::Dotted);
            i += 1;
        } else if let Some(marker) = marker_for(c) {
            format.marker = Some(marker);
            i += 1;
        } else if let Some((_, hex)) = SHORT_COLORS.iter().find(|(short, _)| *short == c) {
            format.color = Some((*hex).to_string());
            i += 1;
        } else {
            return Err(ScriptError::Value(format!(
                "Unrecognized character {c} in format string '{fmt}'"
            )));
        }
    }
    Ok(format)
}

/// Resolve a colour spec to something safe to place in an SVG attribute
fn parse_color(spec: &str) -> Result<String, ScriptError> {
    let spec = spec.trim();
    let mut chars = spec.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some((_, hex)) = SHORT_COLORS.iter().find(|(short, _)| *short == c) {
            return Ok((*hex).to_string());
        }
    }
    if let Some(index) = spec.strip_prefix('C').and_then(|d| d.parse::<usize>().ok()) {
        return Ok(COLOR_CYCLE[index % COLOR_CYCLE.len()].to_string());
    }
    if let Some(hex) = spec.strip_prefix('#') {
        if matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(spec.to_ascii_lowercase());
        }
    }
    if !spec.is_empty() && spec.len() <= 32 && spec.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(spec.to_ascii_lowercase());
    }
    Err(ScriptError::Value(format!("'{spec}' is not a valid color value")))
}

fn parse_line_style(spec: &str) -> Result<LineStyle, ScriptError> {
    Ok(match spec {
        "-" | "solid" => LineStyle::Solid,
        "--" | "dashed" => LineStyle::Dashed,
        ":" | "dotted" => LineStyle::Dotted,
        "-." | "dashdot" => LineStyle::DashDot,
        "" | " " | "None" | "none" => LineStyle::None,
        other => {
            return Err(ScriptError::Value(format!(
                "'{other}' is not a valid value for ls"
            )))
        }
    })
}

fn number_kwarg(args: &Args, keys: &[&str], what: &str) -> Result<Option<f64>, ScriptError> {
    match args.any_keyword(keys) {
        None | Some(Value::None) => Ok(None),
        Some(value) => value.expect_number(what).map(Some),
    }
}

/// Apply the keyword styling common to every artist
fn apply_style_kwargs(style: &mut Style, args: &Args) -> Result<(), ScriptError> {
    if let Some(color) = args.any_keyword(&["color", "c"]).and_then(Value::as_str) {
        style.color = parse_color(color)?;
    }
    if let Some(ls) = args.any_keyword(&["linestyle", "ls"]) {
        style.line_style = match ls {
            Value::None => LineStyle::None,
            other => parse_line_style(other.as_str().unwrap_or_default())?,
        };
    }
    if let Some(width) = number_kwarg(args, &["linewidth", "lw"], "linewidth")? {
        style.line_width = width.clamp(0.0, 20.0);
    }
    if let Some(marker) = args.keyword("marker").and_then(Value::as_str) {
        let mut chars = marker.chars();
        style.marker = match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) => Some(marker_for(c).ok_or_else(|| {
                ScriptError::Value(format!("Unrecognized marker style '{marker}'"))
            })?),
            _ => return Err(ScriptError::Value(format!("Unrecognized marker style '{marker}'"))),
        };
    }
    if let Some(size) = number_kwarg(args, &["markersize", "ms"], "markersize")? {
        style.marker_size = size.clamp(0.0, 50.0);
    }
    if let Some(alpha) = number_kwarg(args, &["alpha"], "alpha")? {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ScriptError::Value(format!(
                "alpha ({alpha}) is outside 0-1 range"
            )));
        }
        style.alpha = alpha;
    }
    Ok(())
}

fn label(args: &Args) -> Option<String> {
    match args.keyword("label") {
        None | Some(Value::None) => None,
        Some(value) => Some(value.to_string()),
    }
}

// ============================================================================
// Artists
// ============================================================================

fn numeric_data(value: &Value, budget: &mut Budget) -> Result<Vec<f64>, ScriptError> {
    let items = value.to_array()?;
    budget.check_len(items.len())?;
    budget.charge(items.len())?;
    Ok(items.to_vec())
}

fn same_length(x: &[f64], y: &[f64]) -> Result<(), ScriptError> {
    if x.len() != y.len() {
        return Err(ScriptError::Value(format!(
            "x and y must have same first dimension, but have shapes ({},) and ({},)",
            x.len(),
            y.len()
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn index_axis(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

fn plot(figure: &mut Figure, args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    // Group positional arguments into `[x], y, [fmt]` runs
    let positional = args.positional();
    let mut groups: Vec<(Option<&Value>, &Value, Option<&str>)> = Vec::new();
    let mut i = 0;
    while i < positional.len() {
        let first = &positional[i];
        match positional.get(i + 1) {
            Some(Value::Str(fmt)) => {
                groups.push((None, first, Some(&**fmt)));
                i += 2;
            }
            Some(second) => {
                let fmt = positional.get(i + 2).and_then(Value::as_str);
                groups.push((Some(first), second, fmt));
                i += if fmt.is_some() { 3 } else { 2 };
            }
            None => {
                groups.push((None, first, None));
                i += 1;
            }
        }
    }

    let label = label(args);
    let mut drawn = Vec::with_capacity(groups.len());
    for (x, y, fmt) in groups {
        let y = numeric_data(y, budget)?;
        let x = match x {
            Some(x) => numeric_data(x, budget)?,
            None => index_axis(y.len()),
        };
        same_length(&x, &y)?;

        let format = fmt.map(parse_format).transpose()?.unwrap_or_default();
        let color = match format.color {
            Some(color) => color,
            None => figure.axes.next_color(),
        };
        let mut style = Style::line(color);
        style.marker = format.marker;
        style.line_style = match (format.line_style, format.marker) {
            (Some(ls), _) => ls,
            (None, Some(_)) => LineStyle::None,
            (None, None) => LineStyle::Solid,
        };
        apply_style_kwargs(&mut style, args)?;

        figure.axes.series.push(Series {
            kind: SeriesKind::Line,
            x,
            y,
            baseline: None,
            label: label.clone(),
            style,
        });
        drawn.push(Value::None);
    }
    Ok(Value::List(drawn.into()))
}

fn scatter(figure: &mut Figure, args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    let x = numeric_data(args.require(0, "x")?, budget)?;
    let y = numeric_data(args.require(1, "y")?, budget)?;
    if x.len() != y.len() {
        return Err(ScriptError::Value("x and y must be the same size".into()));
    }

    let mut style = Style::line(figure.axes.next_color());
    style.line_style = LineStyle::None;
    style.marker = Some(Marker::Circle);
    // matplotlib sizes scatter markers by area in points squared
    if let Some(area) = args.get(2, "s").and_then(Value::as_number) {
        style.marker_size = area.max(0.0).sqrt().clamp(0.0, 50.0);
    }
    apply_style_kwargs(&mut style, args)?;
    if let Some(color) = args.get(3, "c").and_then(Value::as_str) {
        style.color = parse_color(color)?;
    }

    figure.axes.series.push(Series {
        kind: SeriesKind::Scatter,
        x,
        y,
        baseline: None,
        label: label(args),
        style,
    });
    Ok(Value::None)
}

fn fill_between(figure: &mut Figure, args: &Args, budget: &mut Budget) -> Result<Value, ScriptError> {
    let x = numeric_data(args.require(0, "x")?, budget)?;
    let y1 = numeric_data(args.require(1, "y1")?, budget)?;
    let y2 = match args.get(2, "y2") {
        Some(value) => numeric_data(value, budget)?,
        None => vec![0.0],
    };
    let expand = |mut v: Vec<f64>| {
        if v.len() == 1 {
            v = vec![v[0]; x.len()];
        }
        v
    };
    let (y1, y2) = (expand(y1), expand(y2));
    same_length(&x, &y1)?;
    same_length(&x, &y2)?;

    let mut style = Style::line(figure.axes.next_color());
    style.line_style = LineStyle::None;
    apply_style_kwargs(&mut style, args)?;

    figure.axes.series.push(Series {
        kind: SeriesKind::Fill,
        x,
        y: y1,
        baseline: Some(y2),
        label: label(args),
        style,
    });
    Ok(Value::None)
}

fn reference_line(
    figure: &mut Figure,
    args: &Args,
    orientation: Orientation,
) -> Result<Value, ScriptError> {
    let key = match orientation {
        Orientation::Horizontal => "y",
        Orientation::Vertical => "x",
    };
    let value = match args.get(0, key) {
        Some(v) => v.expect_number(key)?,
        None => 0.0,
    };
    let mut style = Style::line(figure.axes.next_color());
    apply_style_kwargs(&mut style, args)?;
    figure.axes.reference_lines.push(ReferenceLine {
        orientation,
        value,
        label: label(args),
        style,
    });
    Ok(Value::None)
}

/// `set_xlim(lo, hi)`, `set_xlim((lo, hi))`, or the keyword forms
fn set_range(range: &mut AxisRange, args: &Args, keys: [&str; 2]) -> Result<Value, ScriptError> {
    let bound = |value: Option<&Value>, what: &str| -> Result<Option<f64>, ScriptError> {
        match value {
            None | Some(Value::None) => Ok(None),
            Some(v) => v.expect_number(what).map(Some),
        }
    };
    let (low, high) = match args.positional() {
        [Value::Tuple(pair) | Value::List(pair)] if pair.len() == 2 => {
            (bound(pair.first(), keys[0])?, bound(pair.get(1), keys[1])?)
        }
        _ => (
            bound(args.get(0, keys[0]), keys[0])?,
            bound(args.get(1, keys[1]), keys[1])?,
        ),
    };
    for value in [low, high].into_iter().flatten() {
        if !value.is_finite() {
            return Err(ScriptError::Value(
                "Axis limits cannot be NaN or Inf".to_string(),
            ));
        }
    }
    if low.is_some() {
        range.min = low;
    }
    if high.is_some() {
        range.max = high;
    }
    let show = |v: Option<f64>| v.map_or(Value::None, Value::Number);
    Ok(Value::Tuple(vec![show(range.min), show(range.max)].into()))
}

fn legend(figure: &mut Figure, args: &Args) -> Result<Value, ScriptError> {
    if let Some(labels) = args.get(0, "labels") {
        let labels = labels.iter_items()?;
        for (series, text) in figure.axes.series.iter_mut().zip(labels) {
            series.label = Some(text.to_string());
        }
    }
    figure.axes.legend = true;
    Ok(Value::None)
}

fn set_text(slot: &mut Option<String>, args: &Args) -> Result<Value, ScriptError> {
    let text = args.text(0, "label").ok_or_else(|| {
        ScriptError::Type(format!("{}() missing required argument: 'label'", args.name()))
    })?;
    *slot = Some(text);
    Ok(Value::None)
}

// ============================================================================
// Dispatch
// ============================================================================

pub fn call_axes(
    figure: &mut Figure,
    name: &str,
    args: &Args,
    budget: &mut Budget,
) -> Result<Value, ScriptError> {
    match name {
        "plot" => plot(figure, args, budget),
        "scatter" => scatter(figure, args, budget),
        "fill_between" => fill_between(figure, args, budget),
        "set_title" | "title" => set_text(&mut figure.axes.title, args),
        "set_xlabel" | "xlabel" => set_text(&mut figure.axes.xlabel, args),
        "set_ylabel" | "ylabel" => set_text(&mut figure.axes.ylabel, args),
        "set_xlim" | "xlim" => set_range(&mut figure.axes.xlim, args, ["left", "right"]),
        "set_ylim" | "ylim" => set_range(&mut figure.axes.ylim, args, ["bottom", "top"]),
        "grid" => {
            figure.axes.grid = args
                .get(0, "visible")
                .or_else(|| args.keyword("b"))
                .is_none_or(Value::truthy);
            Ok(Value::None)
        }
        "legend" => legend(figure, args),
        "axhline" => reference_line(figure, args, Orientation::Horizontal),
        "axvline" => reference_line(figure, args, Orientation::Vertical),
        "set_aspect" => Ok(Value::None),
        other => Err(ScriptError::Attribute(format!(
            "'Axes' object has no attribute '{other}'"
        ))),
    }
}

pub fn call_figure(figure: &mut Figure, name: &str, args: &Args) -> Result<Value, ScriptError> {
    match name {
        "suptitle" => set_text(&mut figure.title, args),
        "set_size_inches" => {
            let (w, h) = match args.positional() {
                [Value::Tuple(pair) | Value::List(pair)] if pair.len() == 2 => {
                    (pair[0].expect_number("width")?, pair[1].expect_number("height")?)
                }
                _ => (
                    args.require(0, "w")?.expect_number("width")?,
                    args.require(1, "h")?.expect_number("height")?,
                ),
            };
            figure.set_size_inches(w, h);
            Ok(Value::None)
        }
        "add_subplot" | "gca" => Ok(Value::Axes),
        "tight_layout" | "savefig" | "show" => Ok(Value::None),
        other => Err(ScriptError::Attribute(format!(
            "'Figure' object has no attribute '{other}'"
        ))),
    }
}

fn apply_figsize(figure: &mut Figure, args: &Args) -> Result<(), ScriptError> {
    if let Some(Value::Tuple(size) | Value::List(size)) = args.keyword("figsize") {
        if let [w, h] = &size[..] {
            figure.set_size_inches(w.expect_number("width")?, h.expect_number("height")?);
        }
    }
    Ok(())
}

pub fn call_pyplot(
    figure: &mut Figure,
    name: &str,
    args: &Args,
    budget: &mut Budget,
) -> Result<Value, ScriptError> {
    match name {
        "subplots" => {
            let grid = (args.get(0, "nrows"), args.get(1, "ncols"));
            for dim in [grid.0, grid.1].into_iter().flatten() {
                if dim.expect_integer("subplot count")? != 1 {
                    return Err(ScriptError::Value(
                        "only a single set of axes is available".into(),
                    ));
                }
            }
            apply_figsize(figure, args)?;
            Ok(Value::Tuple(vec![Value::Figure, Value::Axes].into()))
        }
        "figure" => {
            apply_figsize(figure, args)?;
            Ok(Value::Figure)
        }
        "gca" => Ok(Value::Axes),
        "gcf" => Ok(Value::Figure),
        // Rendering and cleanup belong to the host
        "show" | "close" | "tight_layout" | "savefig" => Ok(Value::None),
        "suptitle" => call_figure(figure, name, args),
        other => call_axes(figure, other, args, budget),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Limits;

    fn budget() -> Budget {
        Budget::new(Limits::default())
    }

    fn args(name: &'static str, positional: Vec<Value>, keyword: Vec<(&str, Value)>) -> Args {
        Args::new(
            name,
            positional,
            keyword.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    fn arr(values: &[f64]) -> Value {
        Value::array(values.to_vec())
    }

    #[test]
    fn test_format_strings() {
        assert_eq!(
            parse_format("r--").unwrap(),
            Format {
                color: Some("#d62728".into()),
                line_style: Some(LineStyle::Dashed),
                marker: None
            }
        );
        assert_eq!(parse_format("o").unwrap().marker, Some(Marker::Circle));
        assert_eq!(parse_format("k-.").unwrap().line_style, Some(LineStyle::DashDot));
        assert!(parse_format("q").is_err());
    }

    #[test]
    fn test_colors_are_sanitized() {
        assert_eq!(parse_color("red").unwrap(), "red");
        assert_eq!(parse_color("#FF8800").unwrap(), "#ff8800");
        assert_eq!(parse_color("C1").unwrap(), COLOR_CYCLE[1]);
        assert!(parse_color("red\" onload=\"x").is_err());
        assert!(parse_color("#12").is_err());
    }

    #[test]
    fn test_plot_forms() {
        let mut figure = Figure::new();
        let y_only = args("plot", vec![arr(&[3.0, 4.0])], vec![]);
        call_axes(&mut figure, "plot", &y_only, &mut budget()).unwrap();
        assert_eq!(figure.axes.series[0].x, vec![0.0, 1.0]);

        let markers = args(
            "plot",
            vec![arr(&[1.0]), arr(&[2.0]), Value::str("go")],
            vec![("label", Value::str("pt"))],
        );
        call_axes(&mut figure, "plot", &markers, &mut budget()).unwrap();
        let series = &figure.axes.series[1];
        assert_eq!(series.style.line_style, LineStyle::None);
        assert_eq!(series.style.marker, Some(Marker::Circle));
        assert_eq!(series.style.color, "#2ca02c");
        assert_eq!(series.label.as_deref(), Some("pt"));

        let mismatched = args("plot", vec![arr(&[1.0, 2.0]), arr(&[1.0])], vec![]);
        let err = call_axes(&mut figure, "plot", &mismatched, &mut budget()).unwrap_err();
        assert!(err.to_string().contains("same first dimension"));
    }

    #[test]
    fn test_plot_rejects_non_numeric_data() {
        let mut figure = Figure::new();
        let bad = args("plot", vec![Value::Figure], vec![]);
        assert!(call_axes(&mut figure, "plot", &bad, &mut budget()).is_err());
        assert!(!figure.has_content());
    }

    #[test]
    fn test_limits_and_labels() {
        let mut figure = Figure::new();
        let xlim = args(
            "set_xlim",
            vec![Value::Tuple(vec![Value::Number(-1.0), Value::Number(1.0)].into())],
            vec![],
        );
        call_axes(&mut figure, "set_xlim", &xlim, &mut budget()).unwrap();
        assert_eq!(figure.axes.xlim, AxisRange { min: Some(-1.0), max: Some(1.0) });

        let ylim = args("set_ylim", vec![], vec![("bottom", Value::Number(0.0))]);
        call_axes(&mut figure, "set_ylim", &ylim, &mut budget()).unwrap();
        assert_eq!(figure.axes.ylim, AxisRange { min: Some(0.0), max: None });

        let title = args("title", vec![Value::str("Area")], vec![]);
        call_pyplot(&mut figure, "title", &title, &mut budget()).unwrap();
        assert_eq!(figure.axes.title.as_deref(), Some("Area"));
    }

    #[test]
    fn test_fill_between_broadcasts_scalar_baseline() {
        let mut figure = Figure::new();
        let fill = args(
            "fill_between",
            vec![arr(&[0.0, 1.0, 2.0]), arr(&[1.0, 2.0, 3.0])],
            vec![("alpha", Value::Number(0.3))],
        );
        call_axes(&mut figure, "fill_between", &fill, &mut budget()).unwrap();
        let series = &figure.axes.series[0];
        assert_eq!(series.baseline.as_deref(), Some(&[0.0, 0.0, 0.0][..]));
        assert!((series.style.alpha - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_subplots_grid_is_single_axes() {
        let mut figure = Figure::new();
        let grid = args("subplots", vec![Value::Number(2.0), Value::Number(1.0)], vec![]);
        assert!(call_pyplot(&mut figure, "subplots", &grid, &mut budget()).is_err());
        let single = args("subplots", vec![], vec![]);
        assert!(matches!(
            call_pyplot(&mut figure, "subplots", &single, &mut budget()).unwrap(),
            Value::Tuple(handles) if handles.len() == 2
        ));
    }
}
