use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const CONTRACT_ID: &str = "calm_report.compliance_contract";
pub const CONTRACT_VERSION: &str = "1";

pub const TARGET_PAGE_COUNT: usize = 12;
pub const PAGE_BREAK_CLASS: &str = "page-break";
pub const PAGE_BREAK_MARKER: &str = "<div class=\"page-break\"></div>";
pub const ACCENT_CLASS: &str = "teal-accent";
pub const MAX_ACCENTS_PER_PAGE: usize = 1;
/// Internal abbreviation of the five-column responsibility matrix. Never shipped.
pub const INTERNAL_MATRIX_TERM: &str = "rasci";
pub const PUBLIC_MATRIX_TERM: &str = "responsibilities";
pub const SO_WHAT_PHRASE: &str = "so what";
pub const GENERATED_MARKER: &str = "<!-- autogenerated by renderer; do not edit -->";

pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const WEEKLY_COST_TOLERANCE: f64 = 1.0;
pub const ANNUAL_COST_TOLERANCE: f64 = 52.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleCategoryDef {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDef {
    pub id: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub description: &'static str,
}

pub const RULE_CATEGORIES_V1: [RuleCategoryDef; 5] = [
    RuleCategoryDef {
        id: "substitution-integrity",
        name: "Substitution Integrity",
    },
    RuleCategoryDef {
        id: "paged-layout",
        name: "Paged Layout",
    },
    RuleCategoryDef {
        id: "brand",
        name: "Brand",
    },
    RuleCategoryDef {
        id: "figures-tables",
        name: "Figures & Tables",
    },
    RuleCategoryDef {
        id: "numeric-consistency",
        name: "Numeric Consistency",
    },
];

#[rustfmt::skip]
pub const RULES_V1: [RuleDef; 13] = [
    RuleDef { id: "placeholders.unresolved", category: "substitution-integrity", severity: Severity::Error, description: "no ${...} token survives rendering" },
    RuleDef { id: "placeholders.rice_token", category: "substitution-integrity", severity: Severity::Error, description: "no $rN_rice cost-effort token survives rendering" },
    RuleDef { id: "text.double_percent", category: "substitution-integrity", severity: Severity::Error, description: "no NN%% sequence" },
    RuleDef { id: "layout.page_count_target", category: "paged-layout", severity: Severity::Error, description: "document has exactly the target page count" },
    RuleDef { id: "layout.page_count_estimated", category: "paged-layout", severity: Severity::Warning, description: "page count was estimated without page-break markers" },
    RuleDef { id: "brand.accent_per_page", category: "brand", severity: Severity::Error, description: "at most one accent marker per page" },
    RuleDef { id: "brand.internal_matrix_term", category: "brand", severity: Severity::Error, description: "internal responsibility-matrix abbreviation is not shipped" },
    RuleDef { id: "figures.caption_so_what", category: "figures-tables", severity: Severity::Error, description: "every figure has a caption with the so-what framing" },
    RuleDef { id: "tables.raw_markdown", category: "figures-tables", severity: Severity::Error, description: "markdown table syntax was converted to a table element" },
    RuleDef { id: "matrix.role_counts", category: "figures-tables", severity: Severity::Error, description: "each responsibility row has one accountable and at least one responsible name" },
    RuleDef { id: "tables.header_units", category: "figures-tables", severity: Severity::Warning, description: "tables carry a header row with unit hints" },
    RuleDef { id: "figures.svg_accessibility", category: "figures-tables", severity: Severity::Warning, description: "inline diagrams carry title and desc metadata" },
    RuleDef { id: "numbers.cost_formula", category: "numeric-consistency", severity: Severity::Error, description: "weekly and annual cost formula lines re-derive within tolerance" },
];

pub fn rule(id: &str) -> Option<&'static RuleDef> {
    RULES_V1.iter().find(|rule| rule.id == id)
}

pub fn category(id: &str) -> Option<&'static RuleCategoryDef> {
    RULE_CATEGORIES_V1.iter().find(|category| category.id == id)
}

pub fn rules_with_severity(severity: Severity) -> impl Iterator<Item = &'static RuleDef> {
    RULES_V1.iter().filter(move |rule| rule.severity == severity)
}

static CATALOG_JSON: OnceLock<String> = OnceLock::new();
static CONTRACT_FINGERPRINT: OnceLock<String> = OnceLock::new();

fn catalog_value() -> Value {
    let categories: Vec<Value> = RULE_CATEGORIES_V1
        .iter()
        .map(|c| json!({ "id": c.id, "name": c.name }))
        .collect();
    let rules: Vec<Value> = RULES_V1
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "category": r.category,
                "severity": r.severity.as_str(),
                "description": r.description,
            })
        })
        .collect();
    json!({
        "contract_id": CONTRACT_ID,
        "contract_version": CONTRACT_VERSION,
        "markers": {
            "page_break_class": PAGE_BREAK_CLASS,
            "accent_class": ACCENT_CLASS,
            "max_accents_per_page": MAX_ACCENTS_PER_PAGE,
            "target_page_count": TARGET_PAGE_COUNT,
            "internal_matrix_term": INTERNAL_MATRIX_TERM,
            "public_matrix_term": PUBLIC_MATRIX_TERM,
            "so_what_phrase": SO_WHAT_PHRASE,
        },
        "tolerances": {
            "weeks_per_year": WEEKS_PER_YEAR,
            "weekly_cost": WEEKLY_COST_TOLERANCE,
            "annual_cost": ANNUAL_COST_TOLERANCE,
        },
        "categories": categories,
        "rules": rules,
    })
}

pub fn catalog_json() -> &'static str {
    CATALOG_JSON.get_or_init(|| catalog_value().to_string())
}

fn hex_digest(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_digest(&Sha256::digest(bytes))
}

pub fn contract_fingerprint_sha256() -> String {
    CONTRACT_FINGERPRINT
        .get_or_init(|| {
            let mut hasher = Sha256::new();
            hasher.update(CONTRACT_ID.as_bytes());
            hasher.update(b"\n");
            hasher.update(CONTRACT_VERSION.as_bytes());
            hasher.update(b"\n");
            hasher.update(catalog_json().as_bytes());
            hex_digest(&hasher.finalize())
        })
        .clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    NotEvaluated,
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NotEvaluated => "not_evaluated",
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceSummary {
    pub contract_id: &'static str,
    pub contract_version: &'static str,
    pub contract_fingerprint_sha256: String,
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
    pub not_evaluated: usize,
    pub rules: BTreeMap<&'static str, Verdict>,
    pub categories: BTreeMap<&'static str, Verdict>,
}

impl ComplianceSummary {
    pub fn to_json(&self) -> Value {
        let rules: serde_json::Map<String, Value> = self
            .rules
            .iter()
            .map(|(id, v)| (id.to_string(), Value::from(v.as_str())))
            .collect();
        let categories: serde_json::Map<String, Value> = self
            .categories
            .iter()
            .map(|(id, v)| (id.to_string(), Value::from(v.as_str())))
            .collect();
        json!({
            "contract_id": self.contract_id,
            "contract_version": self.contract_version,
            "contract_fingerprint_sha256": self.contract_fingerprint_sha256,
            "counts": {
                "pass": self.pass,
                "warn": self.warn,
                "fail": self.fail,
                "not_evaluated": self.not_evaluated,
            },
            "rules": rules,
            "categories": categories,
        })
    }
}

/// Folds per-rule verdicts into one summary. A rule reported more than once keeps its worst
/// verdict; ids outside the catalog are ignored.
pub fn summarize_verdicts<'a, I>(rule_verdicts: I) -> ComplianceSummary
where
    I: IntoIterator<Item = (&'a str, Verdict)>,
{
    let mut rules: BTreeMap<&'static str, Verdict> = RULES_V1
        .iter()
        .map(|rule| (rule.id, Verdict::NotEvaluated))
        .collect();
    for (rule_id, verdict) in rule_verdicts {
        let Some(def) = rule(rule_id.trim()) else {
            continue;
        };
        let entry = rules.entry(def.id).or_insert(Verdict::NotEvaluated);
        if verdict > *entry {
            *entry = verdict;
        }
    }

    let mut categories: BTreeMap<&'static str, Verdict> = RULE_CATEGORIES_V1
        .iter()
        .map(|c| (c.id, Verdict::NotEvaluated))
        .collect();
    for def in RULES_V1.iter() {
        let verdict = rules.get(def.id).copied().unwrap_or(Verdict::NotEvaluated);
        if let Some(entry) = categories.get_mut(def.category) {
            if verdict > *entry {
                *entry = verdict;
            }
        }
    }

    let mut summary = ComplianceSummary {
        contract_id: CONTRACT_ID,
        contract_version: CONTRACT_VERSION,
        contract_fingerprint_sha256: contract_fingerprint_sha256(),
        pass: 0,
        warn: 0,
        fail: 0,
        not_evaluated: 0,
        rules: BTreeMap::new(),
        categories,
    };
    for verdict in rules.values() {
        match verdict {
            Verdict::Pass => summary.pass += 1,
            Verdict::Warn => summary.warn += 1,
            Verdict::Fail => summary.fail += 1,
            Verdict::NotEvaluated => summary.not_evaluated += 1,
        }
    }
    summary.rules = rules;
    summary
}

/// `weekly = hours × rate × team_size`, `annual = weekly × 52`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostFormula {
    pub hours_per_person_week: f64,
    pub hourly_rate: f64,
    pub team_size: f64,
}

impl CostFormula {
    pub fn new(hours_per_person_week: f64, hourly_rate: f64, team_size: f64) -> Self {
        Self {
            hours_per_person_week,
            hourly_rate,
            team_size,
        }
    }

    pub fn weekly(&self) -> f64 {
        self.hours_per_person_week * self.hourly_rate * self.team_size
    }

    pub fn annual(&self) -> f64 {
        self.weekly() * WEEKS_PER_YEAR
    }

    pub fn weekly_matches(&self, displayed: f64) -> bool {
        (displayed - self.weekly()).abs() <= WEEKLY_COST_TOLERANCE
    }

    pub fn annual_matches(&self, displayed: f64) -> bool {
        (displayed - self.annual()).abs() <= ANNUAL_COST_TOLERANCE
    }
}
