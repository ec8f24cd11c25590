use crate::error::MarkupError;
use regex_lite::Regex;
use std::sync::OnceLock;

/// Directory the rendered `<img>` paths point at.
pub const COMPONENTS_PREFIX: &str = "templates/components/";

const CAPTION_LOOKAHEAD: usize = 3;

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^!\[([^\]]*)\]\(components/([^)]*)\)$").expect("figure pattern compiles")
    })
}

/// Built-in captions for the standard report components.
pub fn default_caption(file: &str) -> Option<&'static str> {
    let caption = match file {
        "radar.svg" => {
            "what it shows: behavioral preferences across 6-axis radar / so what: identifies systematic vs collaborative tendencies"
        }
        "time-pie.svg" => {
            "what it shows: current time distribution across work activities / so what: identifies productivity bottlenecks and optimization opportunities"
        }
        "handoff-flow.svg" | "swimlane.svg" => {
            "what it shows: workflow handoffs and decision points / so what: reveals communication gaps and process inefficiencies"
        }
        "workflow-heatmap.svg" => {
            "what it shows: process efficiency scores across key activities / so what: highlights areas needing immediate attention"
        }
        "integration-map.svg" => {
            "what it shows: system connections and data flow / so what: identifies integration gaps and optimization opportunities"
        }
        "savings-line-12mo.svg" => {
            "what it shows: projected savings over 12-month implementation / so what: demonstrates clear path to positive roi"
        }
        "savings-line-5yr.svg" => {
            "what it shows: projected savings over 5-year implementation (units: $000s) / so what: demonstrates long-term roi and break-even analysis"
        }
        "impact-matrix.svg" => {
            "what it shows: initiatives mapped by impact vs effort / so what: prioritizes quick wins and strategic investments"
        }
        "mini-gantt.svg" => {
            "what it shows: phased implementation timeline with milestones / so what: provides clear execution path with dependencies"
        }
        _ => return None,
    };
    Some(caption)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionSource {
    Inline,
    Catalog,
    AltText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Figure {
    pub alt: String,
    pub file: String,
    pub caption: String,
    pub caption_source: CaptionSource,
}

// `&` passes through: substituted values already arrive entity-escaped.
fn escape_markup(value: &str) -> String {
    value.replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_markup(value).replace('"', "&quot;")
}

fn italic_caption(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('_')?.strip_suffix('_')?;
    if inner.trim().is_empty() {
        None
    } else {
        Some(inner.trim())
    }
}

impl Figure {
    /// Matches a line holding a single `![alt](components/file)` reference.
    pub fn is_reference(line: &str) -> bool {
        reference_re().is_match(line.trim())
    }

    /// Builds the figure for the reference on `line`, consuming an italic caption from the
    /// following lines when one is present. Returns the figure and how many following lines
    /// it consumed.
    pub fn parse(
        line: &str,
        following: &[&str],
        line_no: usize,
    ) -> Result<Option<(Self, usize)>, MarkupError> {
        let Some(caps) = reference_re().captures(line.trim()) else {
            return Ok(None);
        };
        let alt = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
        let file = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .unwrap_or_default()
            .to_string();
        if file.is_empty() {
            return Err(MarkupError::EmptyFigureTarget { line: line_no });
        }

        let mut consumed = 0;
        let mut inline_caption = None;
        for (idx, next) in following.iter().take(CAPTION_LOOKAHEAD).enumerate() {
            let next = next.trim();
            if next.is_empty() {
                continue;
            }
            if let Some(caption) = italic_caption(next) {
                inline_caption = Some(caption.to_string());
                consumed = idx + 1;
            }
            break;
        }

        let (caption, caption_source) = match inline_caption {
            Some(caption) => (caption, CaptionSource::Inline),
            None => match default_caption(&file) {
                Some(caption) => (caption.to_string(), CaptionSource::Catalog),
                None => (alt.clone(), CaptionSource::AltText),
            },
        };
        Ok(Some((
            Self {
                alt,
                file,
                caption,
                caption_source,
            },
            consumed,
        )))
    }

    pub fn render(&self) -> String {
        format!(
            "<figure><img src=\"{COMPONENTS_PREFIX}{}\" alt=\"{}\" class=\"chart\"><figcaption>{}</figcaption></figure>",
            escape_attr(&self.file),
            escape_attr(&self.alt),
            escape_markup(&self.caption)
        )
    }
}
