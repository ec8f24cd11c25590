use regex_lite::Regex;
use std::sync::OnceLock;

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern compiles"))
}

// Markers must hug the emphasized text, so arithmetic like `5 * 3` is left alone.
fn star_em_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*").expect("emphasis pattern compiles")
    })
}

// Underscore emphasis only at word edges so identifiers like `a_b_c` survive.
fn underscore_em_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^|[\s(>])_([^_\n]+?)_($|[\s).,;:!?<])")
            .expect("underscore emphasis pattern compiles")
    })
}

/// Converts `**bold**`, `*em*` and `_em_` spans.
pub fn render_inline(text: &str) -> String {
    let text = bold_re().replace_all(text, "<strong>${1}</strong>");
    let text = star_em_re().replace_all(&text, "<em>${1}</em>");
    let mut text = text.into_owned();
    // Adjacent spans share a boundary character; a second pass picks up the rest.
    for _ in 0..2 {
        text = underscore_em_re()
            .replace_all(&text, "${1}<em>${2}</em>${3}")
            .into_owned();
    }
    text
}
