//! Time-bounded snippet execution off the async runtime

use super::Figure;
use crate::script::{self, Limits, ScriptError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Deep expression nesting recurses; give the worker room for it
const SANDBOX_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Slack past the interpreter's own deadline before the caller gives up
const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// Runs snippets against a fresh renderer-owned figure.
///
/// Each run gets its own thread, figure, and budget. Nothing from the
/// session is reachable from inside.
#[derive(Debug, Clone, Default)]
pub struct PlotSandbox {
    limits: Limits,
}

impl PlotSandbox {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub async fn run(&self, code: &str) -> Result<Figure, ScriptError> {
        let started = Instant::now();
        let (tx, rx) = oneshot::channel();
        let source = code.to_string();
        let limits = self.limits.clone();

        let spawned = std::thread::Builder::new()
            .name("plot-sandbox".to_string())
            .stack_size(SANDBOX_STACK_SIZE)
            .spawn(move || {
                // Receiver may be gone after a timeout
                let _ = tx.send(script::execute(&source, Figure::new(), &limits));
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to start plot sandbox thread");
            return Err(ScriptError::Resource(format!("could not start sandbox: {e}")));
        }

        let result = match tokio::time::timeout(self.limits.timeout + TIMEOUT_GRACE, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ScriptError::Resource(
                "sandbox stopped without producing a result".to_string(),
            )),
            Err(_) => Err(ScriptError::Timeout(self.limits.timeout)),
        };

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(figure) => tracing::debug!(
                duration_ms,
                series = figure.axes.series.len(),
                "Plot snippet executed"
            ),
            Err(e) => tracing::warn!(duration_ms, error_code = e.code(), error = %e, "Plot snippet failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_populated_figure() {
        let sandbox = PlotSandbox::default();
        let figure = sandbox
            .run("x = np.linspace(0, 1, 5)\nax.plot(x, x ** 2, label='square')")
            .await
            .unwrap();
        assert_eq!(figure.axes.series.len(), 1);
        assert_eq!(figure.axes.series[0].label.as_deref(), Some("square"));
    }

    #[tokio::test]
    async fn test_each_run_gets_a_fresh_figure() {
        let sandbox = PlotSandbox::default();
        sandbox.run("ax.plot([1, 2, 3])").await.unwrap();
        let second = sandbox.run("ax.set_title('empty')").await.unwrap();
        assert!(second.axes.series.is_empty());
    }

    #[tokio::test]
    async fn test_runaway_snippet_times_out() {
        let limits = Limits {
            max_steps: u64::MAX,
            ..Limits::default()
        }
        .with_timeout(Duration::from_millis(20));
        let sandbox = PlotSandbox::new(limits);
        let code = "y = np.sin(np.linspace(0, 1, 100000))\n".repeat(400);
        let err = sandbox.run(&code).await.unwrap_err();
        assert_eq!(err.code(), "Timeout");
        assert_eq!(err.to_string(), "plot execution timed out after 20ms");
    }

    #[tokio::test]
    async fn test_errors_come_back_as_script_errors() {
        let err = PlotSandbox::default().run("ax.plot(1/0)").await.unwrap_err();
        assert_eq!(err.code(), "ZeroDivisionError");
    }
}
