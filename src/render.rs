//! Response rendering
//!
//! Classifies an assistant turn as prose or a plotting snippet and, for
//! snippets, runs them in the sandbox to produce a figure. Rendering is a
//! pure projection of the turn's text: it never touches session state, and
//! a failure only changes what is displayed, never what is stored.

mod detect;
mod figure;
mod sandbox;
mod svg;

pub use detect::{FenceMarkerDetector, PlotDetector};
pub use figure::{
    AxisRange, Figure, LineStyle, Marker, Orientation, ReferenceLine, Series, SeriesKind, Style,
    COLOR_CYCLE,
};
pub use sandbox::PlotSandbox;
pub use svg::to_svg;

use crate::script::Limits;
use serde::Serialize;
use std::sync::Arc;

/// What the presentation layer shows for one assistant turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderArtifact {
    Text {
        text: String,
    },
    Plot {
        figure: Figure,
        svg: String,
    },
    /// The snippet failed; `code` is the original snippet, verbatim
    RenderError {
        message: String,
        error_type: String,
        code: String,
    },
}

impl RenderArtifact {
    pub fn is_plot(&self) -> bool {
        matches!(self, RenderArtifact::Plot { .. })
    }
}

#[derive(Clone)]
pub struct ResponseRenderer {
    detector: Arc<dyn PlotDetector>,
    sandbox: PlotSandbox,
}

impl Default for ResponseRenderer {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl ResponseRenderer {
    pub fn new(limits: Limits) -> Self {
        Self::with_detector(Arc::new(FenceMarkerDetector::default()), limits)
    }

    pub fn with_detector(detector: Arc<dyn PlotDetector>, limits: Limits) -> Self {
        Self {
            detector,
            sandbox: PlotSandbox::new(limits),
        }
    }

    pub async fn render(&self, content: &str) -> RenderArtifact {
        let Some(code) = self.detector.detect(content) else {
            return RenderArtifact::Text {
                text: content.to_string(),
            };
        };

        match self.sandbox.run(&code).await {
            Ok(figure) if figure.has_content() => {
                let svg = to_svg(&figure);
                RenderArtifact::Plot { figure, svg }
            }
            Ok(_) => RenderArtifact::RenderError {
                message: "no plot was drawn: the snippet ran but added nothing to the axes"
                    .to_string(),
                error_type: "EmptyPlot".to_string(),
                code,
            },
            Err(e) => RenderArtifact::RenderError {
                message: e.to_string(),
                error_type: e.code().to_string(),
                code,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    const PARABOLA: &str = "Here is the graph of y = x^2 + 1:\n\n```python\nimport numpy as np\nimport matplotlib.pyplot as plt\n\nx = np.linspace(-3, 3, 61)\ny = x**2 + 1\nax.plot(x, y, label='y = x^2 + 1')\nax.set_xlabel('x')\nax.set_ylabel('y')\nax.grid(True)\nax.legend()\n```\n\nThe vertex sits at (0, 1).";

    #[tokio::test]
    async fn test_prose_renders_as_text() {
        let renderer = ResponseRenderer::default();
        let content = "A parabola opens upward when a > 0.";
        assert_eq!(
            renderer.render(content).await,
            RenderArtifact::Text {
                text: content.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_plot_snippet_renders_figure() {
        let artifact = ResponseRenderer::default().render(PARABOLA).await;
        let RenderArtifact::Plot { figure, svg } = artifact else {
            panic!("expected a plot artifact");
        };
        assert_eq!(figure.axes.series.len(), 1);
        assert_eq!(figure.axes.series[0].x.len(), 61);
        assert_eq!(figure.axes.xlabel.as_deref(), Some("x"));
        assert!(figure.axes.grid && figure.axes.legend);
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("y = x^2 + 1"));
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_snippet_verbatim() {
        let content = "Try this:\n```python\nax.plot(1/0)\n```";
        let artifact = ResponseRenderer::default().render(content).await;
        assert_eq!(
            artifact,
            RenderArtifact::RenderError {
                message: "ZeroDivisionError: division by zero (line 1)".to_string(),
                error_type: "ZeroDivisionError".to_string(),
                code: "ax.plot(1/0)\n".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_undefined_name_is_reported() {
        let content = "```\nax.plot(x, y)\n```";
        let RenderArtifact::RenderError { message, code, .. } =
            ResponseRenderer::default().render(content).await
        else {
            panic!("expected render error");
        };
        assert_eq!(message, "NameError: name 'x' is not defined (line 1)");
        assert_eq!(code, "ax.plot(x, y)\n");
    }

    #[tokio::test]
    async fn test_snippet_that_draws_nothing() {
        let renderer = ResponseRenderer::default();
        for body in [
            "# ax.plot(x) would go here\nx = 1",
            "ax.plot([])",
            "ax.plot([np.nan, np.nan])",
            "ax.plot([np.nan])\nax.axhline(np.inf)",
        ] {
            let artifact = renderer.render(&format!("```\n{body}\n```")).await;
            assert!(
                matches!(
                    artifact,
                    RenderArtifact::RenderError { ref error_type, .. } if error_type == "EmptyPlot"
                ),
                "{body}: {artifact:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_slow_snippet_times_out() {
        let limits = Limits {
            max_steps: u64::MAX,
            ..Limits::default()
        }
        .with_timeout(Duration::from_millis(20));
        let body = "y = np.cos(np.linspace(0, 1, 100000))\n".repeat(400);
        let content = format!("```python\n{body}ax.plot([1, 2])\n```");
        let artifact = ResponseRenderer::new(limits).render(&content).await;
        let RenderArtifact::RenderError {
            message,
            error_type,
            code,
        } = artifact
        else {
            panic!("expected timeout");
        };
        assert_eq!(error_type, "Timeout");
        assert!(message.contains("timed out"));
        assert!(code.ends_with("ax.plot([1, 2])\n"));
    }

    #[tokio::test]
    async fn test_custom_detector_is_used() {
        struct Never;
        impl PlotDetector for Never {
            fn detect(&self, _content: &str) -> Option<String> {
                None
            }
        }
        let renderer = ResponseRenderer::with_detector(Arc::new(Never), Limits::default());
        assert!(!renderer.render(PARABOLA).await.is_plot());
    }

    #[test]
    fn test_artifact_wire_format() {
        let artifact = RenderArtifact::RenderError {
            message: "boom".to_string(),
            error_type: "ValueError".to_string(),
            code: "ax.plot()".to_string(),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "render_error");
        assert_eq!(json["code"], "ax.plot()");
        let text = serde_json::to_value(RenderArtifact::Text {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(text, serde_json::json!({"kind": "text", "text": "hi"}));
    }

    fn response_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z ,.\n]{0,80}",
            "[a-z ]{0,20}\n```\n(ax\\.plot\\(\\[[0-9], [0-9]\\]\\)|ax\\.scatter\\([a-z]\\)|x = [0-9]/[0-9])\n```",
            "```python\nax\\.plot\\([0-9a-z +*/()]{0,12}\\)\n```",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_rendering_is_deterministic(content in response_strategy()) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let renderer = ResponseRenderer::default();
            let first = runtime.block_on(renderer.render(&content));
            let second = runtime.block_on(renderer.render(&content));
            // Compared on the wire: NaN data never equals itself
            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );

            let detected = FenceMarkerDetector::default().detect(&content).is_some();
            prop_assert_eq!(detected, !matches!(first, RenderArtifact::Text { .. }));
        }
    }
}
