//! Compliance linter.
//!
//! The linter re-reads a finished HTML document and checks it against the compliance
//! contract. It never looks at the record or template that produced the document, so it
//! also works on hand-edited or externally produced files.

mod cost;
mod structure;
mod text;

use crate::assemble::RenderedDocument;
use calm_report_contract::{ComplianceSummary, Verdict, summarize_verdicts};
use kuchiki::traits::TendrilSink;
use serde_json::{Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LintOptions {
    pub fail_on_warnings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCountMethod {
    Markers,
    InlineStyle,
    Headings,
}

impl PageCountMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageCountMethod::Markers => "page_break_markers",
            PageCountMethod::InlineStyle => "inline_page_break_styles",
            PageCountMethod::Headings => "h2_headings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub page_count: usize,
    pub page_count_method: PageCountMethod,
    pub verdicts: BTreeMap<&'static str, Verdict>,
}

impl ComplianceReport {
    /// No render-blocking violations.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn passes(&self, options: &LintOptions) -> bool {
        self.is_success() && (!options.fail_on_warnings || self.warnings.is_empty())
    }

    pub fn summary(&self) -> ComplianceSummary {
        summarize_verdicts(self.verdicts.iter().map(|(id, verdict)| (*id, *verdict)))
    }

    pub fn to_json(&self) -> Value {
        json!({
            "success": self.is_success(),
            "errors": self.errors,
            "warnings": self.warnings,
            "page_count": self.page_count,
            "page_count_method": self.page_count_method.as_str(),
            "contract": self.summary().to_json(),
        })
    }
}

/// Accumulates findings and per-rule verdicts while the checks run.
#[derive(Debug, Default)]
pub(crate) struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    verdicts: BTreeMap<&'static str, Verdict>,
}

impl Findings {
    fn raise(&mut self, rule: &'static str, verdict: Verdict) {
        let entry = self.verdicts.entry(rule).or_insert(Verdict::NotEvaluated);
        if verdict > *entry {
            *entry = verdict;
        }
    }

    pub(crate) fn checked(&mut self, rule: &'static str) {
        self.raise(rule, Verdict::Pass);
    }

    pub(crate) fn error(&mut self, rule: &'static str, message: String) {
        self.raise(rule, Verdict::Fail);
        self.errors.push(message);
    }

    pub(crate) fn warning(&mut self, rule: &'static str, message: String) {
        self.raise(rule, Verdict::Warn);
        self.warnings.push(message);
    }
}

pub fn lint(document: &RenderedDocument) -> ComplianceReport {
    lint_html(document.as_str())
}

pub fn lint_html(html: &str) -> ComplianceReport {
    let mut findings = Findings::default();

    text::check_unresolved_placeholders(html, &mut findings);
    text::check_double_percentages(html, &mut findings);
    text::check_rice_tokens(html, &mut findings);
    text::check_internal_matrix_term(html, &mut findings);
    text::check_raw_table_syntax(html, &mut findings);

    let document = kuchiki::parse_html().one(html);
    let pages = structure::check_page_count(&document, &mut findings);
    structure::check_accents_per_page(&document, pages.method, &mut findings);
    structure::check_figure_captions(&document, &mut findings);
    structure::check_responsibility_matrix(&document, &mut findings);
    structure::check_table_headers(&document, &mut findings);
    structure::check_svg_accessibility(&document, &mut findings);

    let visible = structure::visible_text(&document);
    cost::check_cost_formulas(&visible, &mut findings);

    for error in &findings.errors {
        tracing::error!(%error, "compliance error");
    }
    for warning in &findings.warnings {
        tracing::warn!(%warning, "compliance warning");
    }
    if findings.errors.is_empty() {
        tracing::info!(
            warnings = findings.warnings.len(),
            page_count = pages.count,
            "compliance lint passed"
        );
    }

    ComplianceReport {
        errors: findings.errors,
        warnings: findings.warnings,
        page_count: pages.count,
        page_count_method: pages.method,
        verdicts: findings.verdicts,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use calm_report_contract::PAGE_BREAK_MARKER;

    pub const WEEKLY_LINE: &str =
        "<p>weekly cost: 6.1 hours × $85 × 10 people = $5,185</p>";
    pub const ANNUAL_LINE: &str = "<p>annual cost: $5,185 × 52 weeks = $269,620</p>";

    /// A compliant document body split into `pages` pages, with the cost formula lines
    /// and one accent on the first page.
    pub fn body(pages: usize) -> String {
        let mut parts = vec![format!(
            "<h1>acme corp</h1><p><span class=\"teal-accent\">calm.profile</span></p>{WEEKLY_LINE}{ANNUAL_LINE}"
        )];
        for page in 2..=pages {
            parts.push(format!("<h2>section {page}</h2><p>content</p>"));
        }
        parts.join(&format!("\n{PAGE_BREAK_MARKER}\n"))
    }

    pub fn document(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html lang=\"en\"><head><title>t</title><style>.page-break {{ page-break-before: always; }}</style></head><body>\n{body}\n</body></html>"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{body, document};
    use super::*;

    #[test]
    fn compliant_document_passes_every_rule() {
        let report = lint_html(&document(&body(12)));
        assert!(report.is_success(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
        assert_eq!(report.page_count, 12);
        assert_eq!(report.page_count_method, PageCountMethod::Markers);
        let summary = report.summary();
        assert_eq!(summary.fail, 0);
        assert!(summary.pass >= 10);
    }

    #[test]
    fn eleven_markers_pass_ten_or_twelve_fail() {
        assert!(lint_html(&document(&body(12))).is_success());
        for pages in [11, 13] {
            let report = lint_html(&document(&body(pages)));
            assert_eq!(report.page_count, pages);
            assert!(
                report
                    .errors
                    .iter()
                    .any(|e| e.starts_with(&format!("page count is {pages}"))),
                "errors: {:?}",
                report.errors
            );
            assert_eq!(
                report.verdicts.get("layout.page_count_target"),
                Some(&Verdict::Fail)
            );
        }
    }

    #[test]
    fn fail_on_warnings_turns_warnings_into_failure() {
        let html = document(&format!(
            "{}<table><tr><td>x</td></tr></table>",
            body(12)
        ));
        let report = lint_html(&html);
        assert!(report.is_success());
        assert!(!report.warnings.is_empty());
        assert!(report.passes(&LintOptions::default()));
        assert!(!report.passes(&LintOptions {
            fail_on_warnings: true
        }));
    }

    #[test]
    fn json_report_carries_contract_summary() {
        let report = lint_html(&document(&body(12)));
        let value = report.to_json();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["page_count"], json!(12));
        assert_eq!(value["page_count_method"], json!("page_break_markers"));
        assert_eq!(
            value["contract"]["contract_id"],
            json!(calm_report_contract::CONTRACT_ID)
        );
    }
}
