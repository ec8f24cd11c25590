use super::Findings;
use calm_report_contract::CostFormula;
use regex_lite::Regex;
use std::sync::OnceLock;

const RULE: &str = "numbers.cost_formula";

fn weekly_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"weekly cost: (\d+(?:\.\d+)?) hours × \$(\d{1,3}(?:,\d{3})*(?:\.\d+)?) × (\d{1,3}(?:,\d{3})*) people = \$(\d{1,3}(?:,\d{3})*)",
        )
        .expect("weekly formula pattern compiles")
    })
}

fn annual_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"annual cost: \$(\d{1,3}(?:,\d{3})*) × 52 weeks = \$(\d{1,3}(?:,\d{3})*)")
            .expect("annual formula pattern compiles")
    })
}

fn number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

fn money(value: f64) -> String {
    crate::format::fmt_currency(value)
}

struct WeeklyLine {
    formula: CostFormula,
    displayed: f64,
}

struct AnnualLine {
    weekly: f64,
    displayed: f64,
}

fn parse_weekly(text: &str) -> Option<WeeklyLine> {
    let caps = weekly_re().captures(text)?;
    let hours = number(caps.get(1)?.as_str())?;
    let rate = number(caps.get(2)?.as_str())?;
    let team = number(caps.get(3)?.as_str())?;
    Some(WeeklyLine {
        formula: CostFormula::new(hours, rate, team),
        displayed: number(caps.get(4)?.as_str())?,
    })
}

fn parse_annual(text: &str) -> Option<AnnualLine> {
    let caps = annual_re().captures(text)?;
    Some(AnnualLine {
        weekly: number(caps.get(1)?.as_str())?,
        displayed: number(caps.get(2)?.as_str())?,
    })
}

/// Re-derives the weekly and annual cost lines from the inputs they quote.
pub(super) fn check_cost_formulas(visible_text: &str, findings: &mut Findings) {
    findings.checked(RULE);
    let (Some(weekly), Some(annual)) = (parse_weekly(visible_text), parse_annual(visible_text))
    else {
        findings.error(
            RULE,
            "cost calculation validation failed: could not find cost formula lines".to_string(),
        );
        return;
    };

    if !weekly.formula.weekly_matches(weekly.displayed) {
        findings.error(
            RULE,
            format!(
                "weekly cost mismatch: displayed {}, calculated {}",
                money(weekly.displayed),
                money(weekly.formula.weekly())
            ),
        );
    }
    if !weekly.formula.annual_matches(annual.displayed) {
        findings.error(
            RULE,
            format!(
                "annual cost mismatch: displayed {}, calculated {}",
                money(annual.displayed),
                money(weekly.formula.annual())
            ),
        );
    }
    if weekly.displayed != annual.weekly {
        findings.error(
            RULE,
            format!(
                "weekly cost inconsistency: {} vs {}",
                money(weekly.displayed),
                money(annual.weekly)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> Vec<String> {
        let mut findings = Findings::default();
        check_cost_formulas(text, &mut findings);
        findings.errors
    }

    const ANNUAL: &str = "annual cost: $5,185 × 52 weeks = $269,620";

    #[test]
    fn consistent_formulas_pass() {
        let text = format!("weekly cost: 6.1 hours × $85 × 10 people = $5,185 {ANNUAL}");
        assert!(run(&text).is_empty());
    }

    #[test]
    fn weekly_cost_off_by_more_than_tolerance_fails() {
        let text = "weekly cost: 6.1 hours × $85 × 10 people = $5,200 annual cost: $5,200 × 52 weeks = $270,400";
        let errors = run(text);
        assert_eq!(
            errors,
            vec![
                "weekly cost mismatch: displayed $5,200, calculated $5,185".to_string(),
                "annual cost mismatch: displayed $270,400, calculated $269,620".to_string(),
            ]
        );
    }

    #[test]
    fn annual_tolerance_absorbs_weekly_rounding() {
        let text = "weekly cost: 6.1 hours × $85 × 10 people = $5,185 annual cost: $5,185 × 52 weeks = $269,660";
        assert!(run(text).is_empty());
        let text = "weekly cost: 6.1 hours × $85 × 10 people = $5,185 annual cost: $5,185 × 52 weeks = $269,700";
        assert_eq!(run(text).len(), 1);
    }

    #[test]
    fn quoted_weekly_figures_must_match_exactly() {
        let text = "weekly cost: 6.1 hours × $85 × 10 people = $5,185 annual cost: $5,186 × 52 weeks = $269,620";
        assert_eq!(
            run(text),
            vec!["weekly cost inconsistency: $5,185 vs $5,186".to_string()]
        );
    }

    #[test]
    fn missing_lines_are_an_error() {
        assert_eq!(
            run(ANNUAL),
            vec!["cost calculation validation failed: could not find cost formula lines".to_string()]
        );
    }

    #[test]
    fn grouped_rate_and_team_size_parse() {
        let text = "weekly cost: 2.0 hours × $1,000 × 1,000 people = $2,000,000 annual cost: $2,000,000 × 52 weeks = $104,000,000";
        assert!(run(text).is_empty());
    }
}
