use super::Findings;
use regex_lite::Regex;
use std::sync::OnceLock;

fn unresolved_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{[^}]+\}").expect("unresolved pattern compiles"))
}

fn double_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+%%").expect("double percent pattern compiles"))
}

fn rice_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$r\d+_rice").expect("rice token pattern compiles"))
}

fn internal_term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b{}\b", calm_report_contract::INTERNAL_MATRIX_TERM);
        Regex::new(&pattern).expect("internal term pattern compiles")
    })
}

fn raw_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\|\s*[-:]+\s*\|").expect("raw table pattern compiles"))
}

fn table_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<table[^>]*>").expect("table tag pattern compiles"))
}

fn quoted(matches: &[&str]) -> String {
    let items: Vec<String> = matches.iter().map(|m| format!("'{m}'")).collect();
    format!("[{}]", items.join(", "))
}

pub(super) fn check_unresolved_placeholders(html: &str, findings: &mut Findings) {
    const RULE: &str = "placeholders.unresolved";
    findings.checked(RULE);
    let found: Vec<&str> = unresolved_re().find_iter(html).map(|m| m.as_str()).collect();
    if !found.is_empty() {
        findings.error(
            RULE,
            format!("unresolved placeholders found: {}", quoted(&found)),
        );
    }
}

pub(super) fn check_double_percentages(html: &str, findings: &mut Findings) {
    const RULE: &str = "text.double_percent";
    findings.checked(RULE);
    let found: Vec<&str> = double_percent_re()
        .find_iter(html)
        .map(|m| m.as_str())
        .collect();
    if !found.is_empty() {
        findings.error(RULE, format!("double percentages found: {}", quoted(&found)));
    }
}

pub(super) fn check_rice_tokens(html: &str, findings: &mut Findings) {
    const RULE: &str = "placeholders.rice_token";
    findings.checked(RULE);
    let found: Vec<&str> = rice_token_re().find_iter(html).map(|m| m.as_str()).collect();
    if !found.is_empty() {
        findings.error(RULE, format!("unresolved rice tokens found: {}", quoted(&found)));
    }
}

pub(super) fn check_internal_matrix_term(html: &str, findings: &mut Findings) {
    const RULE: &str = "brand.internal_matrix_term";
    findings.checked(RULE);
    if internal_term_re().is_match(html) {
        findings.error(
            RULE,
            format!(
                "'{}' reference found - use '{}' instead",
                calm_report_contract::INTERNAL_MATRIX_TERM,
                calm_report_contract::PUBLIC_MATRIX_TERM
            ),
        );
    }
}

pub(super) fn check_raw_table_syntax(html: &str, findings: &mut Findings) {
    const RULE: &str = "tables.raw_markdown";
    findings.checked(RULE);
    let raw = raw_table_re().find_iter(html).count();
    if raw > 0 && !table_tag_re().is_match(html) {
        findings.error(
            RULE,
            format!("raw table syntax detected but no <table> tags found: {raw} instances"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(check: fn(&str, &mut Findings), html: &str) -> Findings {
        let mut findings = Findings::default();
        check(html, &mut findings);
        findings
    }

    #[test]
    fn unresolved_tokens_are_listed() {
        let findings = run(check_unresolved_placeholders, "<p>${a} and ${b:,}</p>");
        assert_eq!(
            findings.errors,
            vec!["unresolved placeholders found: ['${a}', '${b:,}']".to_string()]
        );
    }

    #[test]
    fn double_percent_is_an_error() {
        assert_eq!(run(check_double_percentages, "87.5%%").errors.len(), 1);
        assert!(run(check_double_percentages, "87.5% and 100%").errors.is_empty());
    }

    #[test]
    fn rice_tokens_are_errors() {
        assert_eq!(run(check_rice_tokens, "score $r3_rice").errors.len(), 1);
        assert!(run(check_rice_tokens, "score 120").errors.is_empty());
    }

    #[test]
    fn internal_term_matches_whole_word_any_case() {
        assert_eq!(run(check_internal_matrix_term, "<h2>RASCI matrix</h2>").errors.len(), 1);
        assert!(run(check_internal_matrix_term, "<h2>responsibilities</h2>").errors.is_empty());
        assert!(run(check_internal_matrix_term, "rascival").errors.is_empty());
    }

    #[test]
    fn raw_table_without_table_element_fails() {
        let raw = "<p>| a | b |\n|---|---|\n| 1 | 2 |</p>";
        assert_eq!(run(check_raw_table_syntax, raw).errors.len(), 1);
        let mixed = format!("{raw}<table><tr><td>x</td></tr></table>");
        assert!(run(check_raw_table_syntax, &mixed).errors.is_empty());
    }
}
