use crate::error::ReportError;
use crate::format::escape_html;
use calm_report_contract::{GENERATED_MARKER, sha256_hex};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

pub const DEFAULT_DOCUMENT_TITLE: &str = "calm.profile diagnostic report";

/// A validated stylesheet ready to embed in the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    source: String,
    minified: Option<String>,
}

impl Stylesheet {
    /// Validates `css`; with `minify` the embedded text is the minified form.
    pub fn parse(css: &str, minify: bool) -> Result<Self, ReportError> {
        let sheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|err| ReportError::Asset(format!("invalid stylesheet: {err}")))?;
        let minified = if minify {
            let printed = sheet
                .to_css(PrinterOptions {
                    minify: true,
                    ..PrinterOptions::default()
                })
                .map_err(|err| ReportError::Asset(format!("failed to print stylesheet: {err}")))?;
            Some(printed.code)
        } else {
            None
        };
        Ok(Self {
            source: css.to_string(),
            minified,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_minified(&self) -> bool {
        self.minified.is_some()
    }

    /// Text placed inside `<style>`.
    pub fn embedded(&self) -> &str {
        self.minified.as_deref().unwrap_or(&self.source)
    }
}

/// One self-contained HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    html: String,
}

impl RenderedDocument {
    /// Wraps HTML produced elsewhere, e.g. a file handed to the linter.
    pub fn from_html(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn fingerprint_sha256(&self) -> String {
        sha256_hex(self.html.as_bytes())
    }
}

pub fn assemble(body_html: &str, stylesheet: &Stylesheet, title: &str) -> RenderedDocument {
    let html = format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
    <meta charset=\"UTF-8\">
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
    <title>{title}</title>
    <style>
{css}
    </style>
</head>
<body>
    {GENERATED_MARKER}
{body_html}
</body>
</html>
",
        title = escape_html(title),
        css = stylesheet.embedded().trim_end(),
    );
    tracing::debug!(bytes = html.len(), "assembled html document");
    RenderedDocument { html }
}
