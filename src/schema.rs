use crate::error::{SchemaError, TypeMismatch};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Placeholder rendered for text fields the caller never supplied.
pub const DEFAULT_TEXT: &str = "—";

/// Fields a caller must supply; checked before defaults are injected.
pub const REQUIRED_FIELDS: [&str; 3] = ["company_name", "report_id", "assessment_date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    List,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Real => "real",
            FieldKind::List => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Currency,
    Percent,
    Integer,
    Decimal,
    BulletList,
    CommaList,
    Text,
}

impl FormatCategory {
    /// Category for a field outside the canonical table, derived from its name.
    ///
    /// Numeric precedence: currency (`cost`, `savings`, `rate`, `5yr`), then percent
    /// (`percentage`, `confidence`), then everything else as a grouped integer (`margin`,
    /// `hours`, `count` and the rest all land there).
    pub fn infer(name: &str, kind: FieldKind) -> Self {
        let lower = name.to_ascii_lowercase();
        match kind {
            FieldKind::Text => FormatCategory::Text,
            FieldKind::List => {
                if lower == "top_findings" {
                    FormatCategory::BulletList
                } else {
                    FormatCategory::CommaList
                }
            }
            FieldKind::Integer | FieldKind::Real => {
                if ["cost", "savings", "rate", "5yr"]
                    .iter()
                    .any(|token| lower.contains(token))
                {
                    FormatCategory::Currency
                } else if lower.contains("percentage") || lower.contains("confidence") {
                    FormatCategory::Percent
                } else {
                    FormatCategory::Integer
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub camel: &'static str,
    pub kind: FieldKind,
    pub category: FormatCategory,
}

impl FieldDef {
    pub fn default_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Text => FieldValue::Text(DEFAULT_TEXT.to_string()),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Real => FieldValue::Real(0.0),
            FieldKind::List => FieldValue::List(Vec::new()),
        }
    }
}

const fn def(
    name: &'static str,
    camel: &'static str,
    kind: FieldKind,
    category: FormatCategory,
) -> FieldDef {
    FieldDef {
        name,
        camel,
        kind,
        category,
    }
}

const fn text(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Text, FormatCategory::Text)
}

const fn integer(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Integer, FormatCategory::Integer)
}

const fn real(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Real, FormatCategory::Integer)
}

const fn currency(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Real, FormatCategory::Currency)
}

const fn percent(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Real, FormatCategory::Percent)
}

// One decimal place: these values feed formula lines the linter re-derives.
const fn decimal(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::Real, FormatCategory::Decimal)
}

const fn bullets(name: &'static str, camel: &'static str) -> FieldDef {
    def(name, camel, FieldKind::List, FormatCategory::BulletList)
}

pub const FIELDS: [FieldDef; 164] = [
    text("company_name", "companyName"),
    text("assessment_date", "assessmentDate"),
    text("report_id", "reportId"),
    text("assessment_id", "assessmentId"),
    text("completion_date", "completionDate"),
    text("customer_email", "customerEmail"),
    text("archetype_primary", "archetypePrimary"),
    percent("archetype_confidence", "archetypeConfidence"),
    text("archetype_tagline", "archetypeTagline"),
    real("archetype_mix_primary", "archetypeMixPrimary"),
    real("archetype_mix_secondary", "archetypeMixSecondary"),
    real("archetype_mix_tertiary", "archetypeMixTertiary"),
    real("archetype_mix_quaternary", "archetypeMixQuaternary"),
    text("archetype_secondary", "archetypeSecondary"),
    text("archetype_tertiary", "archetypeTertiary"),
    text("archetype_quaternary", "archetypeQuaternary"),
    integer("axis_structure", "axisStructure"),
    integer("axis_collaboration", "axisCollaboration"),
    integer("axis_scope", "axisScope"),
    integer("axis_tempo", "axisTempo"),
    percent("overhead_percentage", "overheadPercentage"),
    currency("annual_cost", "annualCost"),
    currency("weekly_cost", "weeklyCost"),
    decimal("hours_lost_ppw", "hoursLostPpw"),
    integer("team_size", "teamSize"),
    text("meeting_load", "meetingLoad"),
    currency("hourly_rate", "hourlyRate"),
    text("platform", "platform"),
    text("r1_title", "r1Title"),
    text("r1_description", "r1Description"),
    text("r1_effort", "r1Effort"),
    text("r1_impact", "r1Impact"),
    text("r1_timeline", "r1Timeline"),
    integer("r1_rice", "r1Rice"),
    text("r1_linked_finding", "r1LinkedFinding"),
    text("r2_title", "r2Title"),
    text("r2_description", "r2Description"),
    text("r2_effort", "r2Effort"),
    text("r2_impact", "r2Impact"),
    text("r2_timeline", "r2Timeline"),
    integer("r2_rice", "r2Rice"),
    text("r2_linked_finding", "r2LinkedFinding"),
    text("r3_title", "r3Title"),
    text("r3_description", "r3Description"),
    text("r3_effort", "r3Effort"),
    text("r3_impact", "r3Impact"),
    text("r3_timeline", "r3Timeline"),
    integer("r3_rice", "r3Rice"),
    text("r3_linked_finding", "r3LinkedFinding"),
    text("r4_title", "r4Title"),
    text("r4_description", "r4Description"),
    text("r4_effort", "r4Effort"),
    text("r4_impact", "r4Impact"),
    text("r4_timeline", "r4Timeline"),
    integer("r4_rice", "r4Rice"),
    text("r4_linked_finding", "r4LinkedFinding"),
    text("r5_title", "r5Title"),
    text("r5_description", "r5Description"),
    text("r5_effort", "r5Effort"),
    text("r5_impact", "r5Impact"),
    text("r5_timeline", "r5Timeline"),
    integer("r5_rice", "r5Rice"),
    text("r5_linked_finding", "r5LinkedFinding"),
    text("break_even_timeline", "breakEvenTimeline"),
    integer("team_multiplier", "teamMultiplier"),
    percent("confidence_score", "confidenceScore"),
    integer("response_count", "responseCount"),
    bullets("top_findings", "topFindings"),
    text("radar_insights", "radarInsights"),
    integer("time_productive", "timeProductive"),
    integer("time_meetings", "timeMeetings"),
    integer("time_admin", "timeAdmin"),
    integer("time_context_switch", "timeContextSwitch"),
    text("workflow1_r", "workflow1R"),
    text("workflow1_a", "workflow1A"),
    text("workflow1_s", "workflow1S"),
    text("workflow1_c", "workflow1C"),
    text("workflow1_i", "workflow1I"),
    text("workflow2_r", "workflow2R"),
    text("workflow2_a", "workflow2A"),
    text("workflow2_s", "workflow2S"),
    text("workflow2_c", "workflow2C"),
    text("workflow2_i", "workflow2I"),
    text("workflow3_r", "workflow3R"),
    text("workflow3_a", "workflow3A"),
    text("workflow3_s", "workflow3S"),
    text("workflow3_c", "workflow3C"),
    text("workflow3_i", "workflow3I"),
    text("workflow4_r", "workflow4R"),
    text("workflow4_a", "workflow4A"),
    text("workflow4_s", "workflow4S"),
    text("workflow4_c", "workflow4C"),
    text("workflow4_i", "workflow4I"),
    text("workflow5_r", "workflow5R"),
    text("workflow5_a", "workflow5A"),
    text("workflow5_s", "workflow5S"),
    text("workflow5_c", "workflow5C"),
    text("workflow5_i", "workflow5I"),
    text("f1_issue", "f1Issue"),
    text("f1_evidence", "f1Evidence"),
    text("f1_impact", "f1Impact"),
    text("f1_root_cause", "f1RootCause"),
    text("f1_preview", "f1Preview"),
    text("f2_issue", "f2Issue"),
    text("f2_evidence", "f2Evidence"),
    text("f2_impact", "f2Impact"),
    text("f2_root_cause", "f2RootCause"),
    text("f2_preview", "f2Preview"),
    text("f3_issue", "f3Issue"),
    text("f3_evidence", "f3Evidence"),
    text("f3_impact", "f3Impact"),
    text("f3_root_cause", "f3RootCause"),
    text("f3_preview", "f3Preview"),
    text("f4_issue", "f4Issue"),
    text("f4_evidence", "f4Evidence"),
    text("f4_impact", "f4Impact"),
    text("f4_root_cause", "f4RootCause"),
    text("f4_preview", "f4Preview"),
    text("f5_issue", "f5Issue"),
    text("f5_evidence", "f5Evidence"),
    text("f5_impact", "f5Impact"),
    text("f5_root_cause", "f5RootCause"),
    text("f5_preview", "f5Preview"),
    integer("efficiency_planning", "efficiencyPlanning"),
    integer("efficiency_execution", "efficiencyExecution"),
    integer("efficiency_review", "efficiencyReview"),
    integer("efficiency_communication", "efficiencyCommunication"),
    text("workflow_bottlenecks", "workflowBottlenecks"),
    real("base_overhead", "baseOverhead"),
    decimal("archetype_adjustment", "archetypeAdjustment"),
    real("sensitivity_25_margin", "sensitivity25Margin"),
    currency("sensitivity_25_cost", "sensitivity25Cost"),
    real("sensitivity_25_hours", "sensitivity25Hours"),
    real("sensitivity_50_margin", "sensitivity50Margin"),
    currency("sensitivity_50_cost", "sensitivity50Cost"),
    real("sensitivity_50_hours", "sensitivity50Hours"),
    real("sensitivity_75_margin", "sensitivity75Margin"),
    currency("sensitivity_75_cost", "sensitivity75Cost"),
    real("sensitivity_75_hours", "sensitivity75Hours"),
    currency("conservative_5yr", "conservative5yr"),
    currency("realistic_5yr", "realistic5yr"),
    currency("optimistic_5yr", "optimistic5yr"),
    currency("savings_month1", "savingsMonth1"),
    currency("savings_month3", "savingsMonth3"),
    currency("savings_month6", "savingsMonth6"),
    currency("savings_month12", "savingsMonth12"),
    text("critical_path", "criticalPath"),
    text("milestone_schedule", "milestoneSchedule"),
    text("roadmap_30_days", "roadmap30Days"),
    text("roadmap_60_days", "roadmap60Days"),
    text("roadmap_90_days", "roadmap90Days"),
    real("baseline_ontime", "baselineOntime"),
    real("target_ontime", "targetOntime"),
    text("owner_ontime", "ownerOntime"),
    real("baseline_latency", "baselineLatency"),
    real("target_latency", "targetLatency"),
    text("owner_latency", "ownerLatency"),
    real("baseline_variance", "baselineVariance"),
    real("target_variance", "targetVariance"),
    text("owner_variance", "ownerVariance"),
    real("baseline_change", "baselineChange"),
    real("target_change", "targetChange"),
    text("owner_change", "ownerChange"),
    text("next_steps", "nextSteps"),
];

struct SchemaIndex {
    by_name: HashMap<&'static str, &'static FieldDef>,
    by_camel: HashMap<&'static str, &'static FieldDef>,
}

static SCHEMA_INDEX: OnceLock<SchemaIndex> = OnceLock::new();

fn schema_index() -> &'static SchemaIndex {
    SCHEMA_INDEX.get_or_init(|| SchemaIndex {
        by_name: FIELDS.iter().map(|def| (def.name, def)).collect(),
        by_camel: FIELDS.iter().map(|def| (def.camel, def)).collect(),
    })
}

pub fn field(name: &str) -> Option<&'static FieldDef> {
    schema_index().by_name.get(name).copied()
}

pub fn field_by_camel(camel: &str) -> Option<&'static FieldDef> {
    schema_index().by_camel.get(camel).copied()
}

pub fn field_names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|def| def.name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
    List(Vec<String>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Real(_) => FieldKind::Real,
            FieldValue::List(_) => FieldKind::List,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordField {
    pub value: FieldValue,
    pub category: FormatCategory,
}

/// A normalized report record: every canonical field is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportRecord {
    fields: BTreeMap<String, RecordField>,
    #[serde(skip)]
    defaulted: Vec<String>,
}

impl ReportRecord {
    /// Inserts a value, resolving its format category from the canonical table or, for
    /// unknown names, from the name itself.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        let category = match field(&name) {
            Some(def) => def.category,
            None => FormatCategory::infer(&name, value.kind()),
        };
        self.fields.insert(name, RecordField { value, category });
    }

    pub fn get(&self, name: &str) -> Option<&RecordField> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|field| &field.value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(FieldValue::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(FieldValue::as_f64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordField)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Canonical fields that were absent from the payload and received defaults.
    pub fn defaulted_fields(&self) -> &[String] {
        &self.defaulted
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn list_element_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "list containing null",
        Value::Bool(_) => "list containing boolean",
        Value::Number(_) => "list containing number",
        Value::Array(_) => "list containing list",
        Value::Object(_) => "list containing object",
        Value::String(_) => "list",
    }
}

fn coerce(kind: FieldKind, value: &Value) -> Result<FieldValue, &'static str> {
    match (kind, value) {
        (FieldKind::Text, Value::String(s)) => Ok(FieldValue::Text(s.clone())),
        (FieldKind::Integer, Value::Number(n)) => {
            n.as_i64().map(FieldValue::Integer).ok_or(json_type_name(value))
        }
        // Integers widen to reals; nothing else converts.
        (FieldKind::Real, Value::Number(n)) => {
            n.as_f64().map(FieldValue::Real).ok_or(json_type_name(value))
        }
        (FieldKind::List, Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    other => return Err(list_element_type_name(other)),
                }
            }
            Ok(FieldValue::List(out))
        }
        _ => Err(json_type_name(value)),
    }
}

fn passthrough_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(FieldValue::Integer(i)),
            None => n.as_f64().map(FieldValue::Real),
        },
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    Value::Number(n) => out.push(n.to_string()),
                    Value::Bool(b) => out.push(b.to_string()),
                    _ => return None,
                }
            }
            Some(FieldValue::List(out))
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Maps a caller payload (camelCase or snake_case keys) onto the canonical record.
pub fn normalize(raw: &Value) -> Result<ReportRecord, SchemaError> {
    let Value::Object(payload) = raw else {
        return Err(SchemaError::NotAnObject(json_type_name(raw)));
    };

    // Aliases first so that a snake_case key always wins over its camelCase twin.
    let mut rewritten: BTreeMap<&str, &Value> = BTreeMap::new();
    for (key, value) in payload {
        if let Some(def) = field_by_camel(key) {
            if def.camel != def.name {
                rewritten.insert(def.name, value);
            }
        }
    }
    for (key, value) in payload {
        let is_alias = field_by_camel(key).is_some_and(|def| def.camel != def.name);
        if !is_alias {
            rewritten.insert(key.as_str(), value);
        }
    }

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|name| !rewritten.contains_key(*name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        tracing::error!(fields = ?missing, "required report fields missing");
        return Err(SchemaError::MissingRequired(missing));
    }

    let mut record = ReportRecord::default();
    let mut mismatches = Vec::new();
    for def in FIELDS.iter() {
        match rewritten.get(def.name) {
            Some(value) => match coerce(def.kind, value) {
                Ok(coerced) => record.insert(def.name, coerced),
                Err(found) => mismatches.push(TypeMismatch {
                    field: def.name.to_string(),
                    expected: def.kind,
                    found,
                }),
            },
            None => {
                record.insert(def.name, def.default_value());
                record.defaulted.push(def.name.to_string());
            }
        }
    }
    if !mismatches.is_empty() {
        for mismatch in &mismatches {
            tracing::error!(%mismatch, "report field type error");
        }
        return Err(SchemaError::TypeMismatch(mismatches));
    }

    for (key, value) in &rewritten {
        if field(key).is_some() {
            continue;
        }
        match passthrough_value(value) {
            Some(converted) => record.insert(*key, converted),
            None => tracing::debug!(field = %key, "dropping non-scalar pass-through field"),
        }
    }

    if !record.defaulted.is_empty() {
        tracing::warn!(
            count = record.defaulted.len(),
            fields = ?record.defaulted,
            "missing template fields, injecting defaults"
        );
    }
    tracing::info!(fields = record.len(), "normalized fields for template rendering");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_payload() -> Value {
        json!({
            "companyName": "acme corp",
            "reportId": "r-1001",
            "assessment_date": "Mar 03, 2025",
        })
    }

    #[test]
    fn snake_and_camel_names_are_bijective() {
        let mut snake = std::collections::BTreeSet::new();
        let mut camel = std::collections::BTreeSet::new();
        for def in FIELDS.iter() {
            assert!(snake.insert(def.name), "duplicate field {}", def.name);
            assert!(camel.insert(def.camel), "duplicate alias {}", def.camel);
        }
        assert_eq!(field_by_camel("hoursLostPpw").map(|d| d.name), Some("hours_lost_ppw"));
        assert_eq!(field_by_camel("workflow3A").map(|d| d.name), Some("workflow3_a"));
    }

    #[test]
    fn explicit_categories_agree_with_name_heuristic() {
        let decimal_exceptions = ["hours_lost_ppw", "archetype_adjustment"];
        for def in FIELDS.iter() {
            if decimal_exceptions.contains(&def.name) {
                assert_eq!(def.category, FormatCategory::Decimal);
                continue;
            }
            assert_eq!(
                def.category,
                FormatCategory::infer(def.name, def.kind),
                "category drift for {}",
                def.name
            );
        }
    }

    #[test]
    fn heuristic_precedence_prefers_currency_then_percent() {
        assert_eq!(
            FormatCategory::infer("sensitivity_25_cost", FieldKind::Real),
            FormatCategory::Currency
        );
        assert_eq!(
            FormatCategory::infer("realistic_5yr", FieldKind::Real),
            FormatCategory::Currency
        );
        assert_eq!(
            FormatCategory::infer("archetype_confidence", FieldKind::Real),
            FormatCategory::Percent
        );
        assert_eq!(
            FormatCategory::infer("sensitivity_25_margin", FieldKind::Real),
            FormatCategory::Integer
        );
        assert_eq!(
            FormatCategory::infer("roadmap_kpis", FieldKind::List),
            FormatCategory::CommaList
        );
    }

    #[test]
    fn normalize_fills_every_canonical_field_with_typed_default() {
        let record = normalize(&minimal_payload()).expect("normalize");
        for def in FIELDS.iter() {
            let value = record.value(def.name).expect("canonical field present");
            assert_eq!(value.kind(), def.kind, "kind for {}", def.name);
        }
        assert_eq!(record.text("company_name"), Some("acme corp"));
        assert_eq!(record.text("f3_issue"), Some(DEFAULT_TEXT));
        assert_eq!(record.number("team_size"), Some(0.0));
        assert_eq!(record.value("top_findings"), Some(&FieldValue::List(Vec::new())));
        assert_eq!(record.defaulted_fields().len(), FIELDS.len() - 3);
    }

    #[test]
    fn integer_widens_to_real_but_real_does_not_narrow() {
        let mut payload = minimal_payload();
        payload["hourlyRate"] = json!(85);
        let record = normalize(&payload).expect("normalize");
        assert_eq!(record.value("hourly_rate"), Some(&FieldValue::Real(85.0)));

        payload["team_size"] = json!(10.5);
        let err = normalize(&payload).expect_err("real for integer");
        match err {
            SchemaError::TypeMismatch(list) => {
                assert_eq!(list.len(), 1);
                assert_eq!(list[0].field, "team_size");
                assert_eq!(list[0].found, "float");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn every_type_mismatch_is_reported() {
        let mut payload = minimal_payload();
        payload["axisTempo"] = json!("fast");
        payload["topFindings"] = json!(["ok", 3]);
        payload["company_name"] = json!(42);
        let err = normalize(&payload).expect_err("mismatches");
        let SchemaError::TypeMismatch(list) = err else {
            panic!("expected type mismatch");
        };
        let fields: Vec<&str> = list.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(fields, vec!["company_name", "axis_tempo", "top_findings"]);
        assert_eq!(list[2].found, "list containing number");
    }

    #[test]
    fn required_fields_are_checked_before_defaults() {
        let payload = json!({ "companyName": "acme corp" });
        let err = normalize(&payload).expect_err("missing required");
        assert_eq!(
            err,
            SchemaError::MissingRequired(vec![
                "report_id".to_string(),
                "assessment_date".to_string()
            ])
        );
    }

    #[test]
    fn snake_key_wins_over_camel_alias() {
        let mut payload = minimal_payload();
        payload["company_name"] = json!("canonical inc");
        let record = normalize(&payload).expect("normalize");
        assert_eq!(record.text("company_name"), Some("canonical inc"));
    }

    #[test]
    fn unknown_keys_pass_through_with_inferred_category() {
        let mut payload = minimal_payload();
        payload["roadmap_kpis"] = json!(["25% meeting reduction", "90% adoption"]);
        payload["sensitivity_conservative_cost"] = json!(100000);
        payload["nested"] = json!({ "a": 1 });
        let record = normalize(&payload).expect("normalize");
        let kpis = record.get("roadmap_kpis").expect("kpis");
        assert_eq!(kpis.category, FormatCategory::CommaList);
        let cost = record.get("sensitivity_conservative_cost").expect("cost");
        assert_eq!(cost.category, FormatCategory::Currency);
        assert!(!record.contains("nested"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = normalize(&json!([1, 2])).expect_err("array payload");
        assert_eq!(err, SchemaError::NotAnObject("list"));
    }
}
