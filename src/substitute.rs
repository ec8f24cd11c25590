use crate::error::ReportError;
use crate::format::format_value;
use crate::schema::ReportRecord;
use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

/// An immutable markdown template with `${field}` / `${field:hint}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
}

impl Template {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder tokens in document order, duplicates included.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder_re()
            .find_iter(&self.source)
            .map(|m| m.as_str())
            .collect()
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([^}:]+)(?::[^}]*)?\}").expect("placeholder pattern compiles")
    })
}

fn unresolved_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{[^}]+\}").expect("unresolved pattern compiles"))
}

fn currency_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$+(\d+(?:\.\d+)?%)").expect("currency percent pattern compiles")
    })
}

fn double_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%{2,}").expect("double percent pattern compiles"))
}

/// Every `${...}` token left in `text`, first occurrence order, no duplicates.
pub fn unresolved_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for m in unresolved_re().find_iter(text) {
        if !tokens.iter().any(|t| t == m.as_str()) {
            tokens.push(m.as_str().to_string());
        }
    }
    tokens
}

/// Collapses `$12%` into `12%` and `87.5%%` into `87.5%`.
pub fn cleanup_percentages(text: &str) -> String {
    let text = currency_percent_re().replace_all(text, "$1");
    double_percent_re().replace_all(&text, "${1}%").into_owned()
}

/// Resolves every placeholder in `template` against `record`.
///
/// Formatting follows the field's category; the hint after `:` is ignored. A token that
/// names no field is left in place and reported, as is any token a value carried in.
pub fn substitute(template: &Template, record: &ReportRecord) -> Result<String, ReportError> {
    let mut resolved = 0usize;
    let substituted = placeholder_re().replace_all(&template.source, |caps: &Captures| {
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        match record.get(name) {
            Some(field) => {
                resolved += 1;
                format_value(field)
            }
            None => caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    });

    let tokens = unresolved_tokens(&substituted);
    if !tokens.is_empty() {
        tracing::error!(
            template = %template.name,
            tokens = ?tokens,
            "unresolved placeholders after substitution"
        );
        return Err(ReportError::UnresolvedPlaceholder { tokens });
    }

    let cleaned = cleanup_percentages(&substituted);
    tracing::info!(
        template = %template.name,
        resolved,
        "substituted template placeholders"
    );
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldValue, normalize};
    use serde_json::json;

    fn record() -> ReportRecord {
        normalize(&json!({
            "companyName": "acme corp",
            "reportId": "r-1001",
            "assessmentDate": "Mar 03, 2025",
            "hoursLostPpw": 6.1,
            "hourlyRate": 85,
            "teamSize": 10,
            "weeklyCost": 5185,
            "annualCost": 269620,
            "overheadPercentage": 22,
            "topFindings": ["meetings crowd out focus", "handoffs stall"],
            "sensitivity_25_margin": 25,
        }))
        .expect("normalize")
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        let template = Template::new("t", "${a} and ${b:,} then ${a}");
        assert_eq!(template.placeholders(), vec!["${a}", "${b:,}", "${a}"]);
    }

    #[test]
    fn substitution_formats_by_category_not_hint() {
        let template = Template::new(
            "t",
            "weekly cost: ${hours_lost_ppw} hours × ${hourly_rate:.2f} × ${team_size} people = ${weekly_cost:,}",
        );
        let out = substitute(&template, &record()).expect("substitute");
        assert_eq!(out, "weekly cost: 6.1 hours × $85 × 10 people = $5,185");
    }

    #[test]
    fn substitution_renders_lists_and_percentages() {
        let template = Template::new(
            "t",
            "${overhead_percentage}% overhead ${sensitivity_25_margin}%\n${top_findings}",
        );
        let out = substitute(&template, &record()).expect("substitute");
        assert_eq!(
            out,
            "22.0% overhead 25%\n<ul><li>meetings crowd out focus</li><li>handoffs stall</li></ul>"
        );
    }

    #[test]
    fn substitution_is_total_or_fails_with_every_token() {
        let template = Template::new(
            "t",
            "${company_name} ${missing_one} ${missing_two:,} ${missing_one}",
        );
        let err = substitute(&template, &record()).expect_err("unresolved");
        match err {
            ReportError::UnresolvedPlaceholder { tokens } => {
                assert_eq!(tokens, vec!["${missing_one}", "${missing_two:,}"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn placeholder_smuggled_in_by_a_value_is_caught() {
        let mut record = record();
        record.insert("company_name", FieldValue::Text("${r1_rice}".to_string()));
        let template = Template::new("t", "client: ${company_name}");
        let err = substitute(&template, &record).expect_err("smuggled token");
        assert!(err.to_string().contains("${r1_rice}"));
    }

    #[test]
    fn percentage_cleanup_is_idempotent() {
        let raw = "saves $12% and 87.5%% and 3%%% of $40.5% but keeps $1,200";
        let once = cleanup_percentages(raw);
        assert_eq!(once, "saves 12% and 87.5% and 3% of 40.5% but keeps $1,200");
        assert_eq!(cleanup_percentages(&once), once);
    }

    #[test]
    fn pipe_in_value_does_not_split_table_cells() {
        let record = normalize(&json!({
            "companyName": "acme | sons",
            "reportId": "r-1",
            "assessmentDate": "Mar 03, 2025",
        }))
        .expect("normalize");
        let template =
            Template::new("t", "| Client | Team |\n|---|---|\n| ${company_name} | ops |");
        let text = substitute(&template, &record).expect("substitute");
        let html = crate::markup::to_html(&text).expect("table stays rectangular");
        assert!(html.contains("<td>acme &#124; sons</td>"), "{html}");
    }
}
