use crate::schema::FieldKind;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub field: String,
    pub expected: FieldKind,
    pub found: &'static str,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.field,
            self.expected.as_str(),
            self.found
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("report payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("required report fields missing from payload: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error("report fields have incompatible types: {}", join_mismatches(.0))]
    TypeMismatch(Vec<TypeMismatch>),
}

fn join_mismatches(mismatches: &[TypeMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("table at line {line} has {expected} header cells but row {row} has {found}")]
    RaggedTable {
        line: usize,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("figure at line {line} has no component file name")]
    EmptyFigureTarget { line: usize },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("unresolved placeholders found: {}", .tokens.join(", "))]
    UnresolvedPlaceholder { tokens: Vec<String> },
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),
    #[error("compliance check failed with {} error(s): {}", .errors.len(), .errors.join("; "))]
    Compliance {
        errors: Vec<String>,
        warnings: Vec<String>,
    },
    #[error("render engine error: {0}")]
    RenderEngine(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
