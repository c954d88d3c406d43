//! Deciding whether a response carries a plot snippet

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// Marker calls that identify a snippet as drawing on the axes
pub const DEFAULT_MARKERS: &[&str] = &["ax.plot(", "ax.scatter("];

/// Finds the plotting snippet inside an assistant response, if any.
///
/// Kept behind a trait so the textual heuristic can be replaced by a
/// structured response format without touching execution.
pub trait PlotDetector: Send + Sync {
    /// The snippet body to execute, or `None` for plain text
    fn detect(&self, content: &str) -> Option<String>;
}

/// The first backtick fence, if its body calls one of the marker functions
#[derive(Debug, Clone)]
pub struct FenceMarkerDetector {
    markers: Vec<String>,
}

impl Default for FenceMarkerDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(ToString::to_string).collect())
    }
}

impl FenceMarkerDetector {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl PlotDetector for FenceMarkerDetector {
    fn detect(&self, content: &str) -> Option<String> {
        let body = first_backtick_fence(content)?;
        self.markers
            .iter()
            .any(|marker| body.contains(marker.as_str()))
            .then_some(body)
    }
}

/// Body of the first closed triple-backtick code block.
///
/// Tilde fences and indented blocks are skipped; an unclosed fence does not
/// count as a snippet.
fn first_backtick_fence(content: &str) -> Option<String> {
    let mut body: Option<String> = None;
    for (event, range) in Parser::new(content).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                let block = content.get(range)?.trim();
                let closed = block.len() >= 6 && block.ends_with("```");
                if block.starts_with("```") && closed {
                    body = Some(String::new());
                }
            }
            Event::Text(text) => {
                if let Some(body) = body.as_mut() {
                    body.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) if body.is_some() => return body,
            _ => {}
        }
    }
    None
}
