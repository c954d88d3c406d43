//! Plot snippet language
//!
//! A small interpreter for the Python plotting subset the tutor emits.
//! Snippets run with no ambient capabilities: the only reachable names are
//! the numeric namespace, the plotting namespace, the pre-built figure and
//! axes, and a handful of pure builtins. There is no file, network,
//! process, or environment access to restrict in the first place.

mod args;
mod ast;
mod budget;
mod builtins;
mod interpreter;
mod lines;
mod numeric;
mod parser;
mod pyplot;
mod value;

pub use budget::Limits;

use crate::render::Figure;
use interpreter::Interpreter;
use std::time::Duration;
use thiserror::Error;

/// A snippet failure, named after the Python exception it stands for
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { line: usize, message: String },

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("ImportError: {0}")]
    Import(String),

    #[error("RecursionError: maximum recursion depth exceeded")]
    Recursion,

    #[error("ResourceError: {0}")]
    Resource(String),

    #[error("plot execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("{source} (line {line})")]
    AtLine {
        line: usize,
        source: Box<ScriptError>,
    },
}

impl ScriptError {
    /// Attach the statement's line unless the error already carries one
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ScriptError::Syntax { .. } | ScriptError::Timeout(_) | ScriptError::AtLine { .. } => {
                self
            }
            other => ScriptError::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    /// Short machine-readable classification
    pub fn code(&self) -> &'static str {
        match self {
            ScriptError::Syntax { .. } => "SyntaxError",
            ScriptError::Name(_) => "NameError",
            ScriptError::Attribute(_) => "AttributeError",
            ScriptError::Type(_) => "TypeError",
            ScriptError::Value(_) => "ValueError",
            ScriptError::Index(_) => "IndexError",
            ScriptError::ZeroDivision(_) => "ZeroDivisionError",
            ScriptError::Import(_) => "ImportError",
            ScriptError::Recursion => "RecursionError",
            ScriptError::Resource(_) => "ResourceError",
            ScriptError::Timeout(_) => "Timeout",
            ScriptError::AtLine { source, .. } => source.code(),
        }
    }
}

/// Parse and run a snippet against `figure`, returning what it drew.
///
/// Every statement is parsed before any runs, so a syntax error anywhere
/// means nothing executes.
pub fn execute(source: &str, figure: Figure, limits: &Limits) -> Result<Figure, ScriptError> {
    let chars = source.chars().count();
    if chars > limits.max_source_chars {
        return Err(ScriptError::Resource(format!(
            "snippet of {chars} characters exceeds the limit of {}",
            limits.max_source_chars
        )));
    }

    let lines = lines::split(source)?;
    let program = parser::parse_program(&lines)?;

    let mut interpreter = Interpreter::new(figure, limits.clone());
    interpreter.run(&program)?;
    Ok(interpreter.into_figure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{LineStyle, SeriesKind};

    fn run(source: &str) -> Result<Figure, ScriptError> {
        execute(source, Figure::new(), &Limits::default())
    }

    #[test]
    fn test_typical_snippet() {
        let figure = run(r"
import numpy as np
import matplotlib.pyplot as plt

x = np.linspace(-2, 2, 41)
y = x**2 - 1
ax.plot(x, y, 'r--', label='y = x^2 - 1')
ax.axhline(0, color='k', lw=0.5)
ax.set_title('A parabola')
ax.legend()
plt.show()
")
        .unwrap();

        let axes = &figure.axes;
        assert_eq!(axes.series.len(), 1);
        let series = &axes.series[0];
        assert_eq!(series.kind, SeriesKind::Line);
        assert_eq!(series.x.len(), 41);
        assert!((series.y[0] - 3.0).abs() < 1e-12);
        assert!((series.y[20] + 1.0).abs() < 1e-12);
        assert_eq!(series.style.line_style, LineStyle::Dashed);
        assert_eq!(series.label.as_deref(), Some("y = x^2 - 1"));
        assert_eq!(axes.title.as_deref(), Some("A parabola"));
        assert_eq!(axes.reference_lines.len(), 1);
        assert!(axes.legend);
    }

    #[test]
    fn test_subplots_returns_prebuilt_handles() {
        let figure = run(
            "fig, ax = plt.subplots(figsize=(8, 4))\nax.scatter([1, 2, 3], [3, 1, 2])\nfig.suptitle('points')",
        )
        .unwrap();
        assert_eq!(figure.axes.series[0].kind, SeriesKind::Scatter);
        assert_eq!(figure.title.as_deref(), Some("points"));
        assert_eq!((figure.width, figure.height), (640, 320));
    }

    #[test]
    fn test_division_by_zero_is_reported() {
        let err = run("ax.plot(1/0)").unwrap_err();
        assert_eq!(err.code(), "ZeroDivisionError");
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero (line 1)");
    }

    #[test]
    fn test_array_division_by_zero_is_ieee() {
        let figure = run("x = np.array([-1.0, 0.0, 1.0])\nax.plot(x, x / 0)").unwrap();
        let y = &figure.axes.series[0].y;
        assert!(y[0] == f64::NEG_INFINITY && y[1].is_nan() && y[2] == f64::INFINITY);
    }

    #[test]
    fn test_syntax_error_prevents_execution() {
        let err = run("ax.plot([1, 2])\nax.plot(x y)").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_no_ambient_capabilities() {
        assert_eq!(run("import os").unwrap_err().code(), "ImportError");
        assert_eq!(run("from subprocess import run").unwrap_err().code(), "ImportError");
        assert_eq!(run("open('/etc/passwd')").unwrap_err().code(), "NameError");
        assert_eq!(run("__import__('os')").unwrap_err().code(), "NameError");
        assert_eq!(run("np.load('data.npy')").unwrap_err().code(), "AttributeError");
        assert_eq!(run("plt.savefig('/tmp/out.png')").map(|f| f.axes.series.len()), Ok(0));
    }

    #[test]
    fn test_runaway_snippets_are_stopped() {
        let err = run("x = np.linspace(0, 1, 10000000)").unwrap_err();
        assert_eq!(err.code(), "ResourceError");

        let err = run("f = lambda n: f(n)\nf(1)").unwrap_err();
        assert_eq!(err.code(), "RecursionError");

        let limits = Limits {
            max_steps: 1_000,
            ..Limits::default()
        };
        let source = "x = np.linspace(0, 1, 5000)\ny = np.sin(x)";
        let err = execute(source, Figure::new(), &limits).unwrap_err();
        assert_eq!(err.code(), "ResourceError");
    }

    #[test]
    fn test_string_growth_is_capped() {
        let doubling = format!("s = 'a' * 100000\n{}ax.plot([len(s)])", "s = s + s\n".repeat(12));
        let err = run(&doubling).unwrap_err();
        assert_eq!(err.code(), "ResourceError");
        assert!(matches!(err, ScriptError::AtLine { line: 2, .. }), "{err:?}");

        let err = run("s = 'ab' * 60000").unwrap_err();
        assert_eq!(err.code(), "ResourceError");

        let err = run("s = 'a' * 60000\nt = f'{s}{s}'").unwrap_err();
        assert_eq!(err.code(), "ResourceError");

        let figure = run("s = 'a' * 1000\ns = s + s\nax.plot([len(s)])").unwrap();
        assert_eq!(figure.axes.series[0].y, vec![2000.0]);
    }

    #[test]
    fn test_source_size_limit() {
        let source = "x = 1\n".repeat(5000);
        assert_eq!(run(&source).unwrap_err().code(), "ResourceError");
    }

    #[test]
    fn test_errors_carry_their_line() {
        let err = run("x = [1, 2]\ny = undefined_name + 1").unwrap_err();
        assert_eq!(
            err,
            ScriptError::AtLine {
                line: 2,
                source: Box::new(ScriptError::Name("undefined_name".into()))
            }
        );
    }
}
