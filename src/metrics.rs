use serde::Serialize;
use std::time::Instant;

/// Wall-clock milliseconds per pipeline stage for one compile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileMetrics {
    pub normalize_ms: f64,
    pub substitute_ms: f64,
    pub markup_ms: f64,
    pub assemble_ms: f64,
    pub lint_ms: f64,
    pub render_ms: Option<f64>,
    pub defaulted_fields: usize,
    pub placeholders: usize,
    pub document_bytes: usize,
}

impl CompileMetrics {
    pub fn total_ms(&self) -> f64 {
        self.normalize_ms
            + self.substitute_ms
            + self.markup_ms
            + self.assemble_ms
            + self.lint_ms
            + self.render_ms.unwrap_or(0.0)
    }

    pub fn stages(&self) -> Vec<(&'static str, f64)> {
        let mut stages = vec![
            ("normalize", self.normalize_ms),
            ("substitute", self.substitute_ms),
            ("markup", self.markup_ms),
            ("assemble", self.assemble_ms),
            ("lint", self.lint_ms),
        ];
        if let Some(render) = self.render_ms {
            stages.push(("render", render));
        }
        stages
    }
}

/// Runs `f`, storing its duration in `slot`.
pub(crate) fn timed<T>(slot: &mut f64, f: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let out = f();
    *slot = started.elapsed().as_secs_f64() * 1000.0;
    out
}
