use regex_lite::{Captures, Regex};
use std::sync::OnceLock;

struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

fn rewrite(pattern: &str, replacement: &'static str) -> Rewrite {
    Rewrite {
        pattern: Regex::new(pattern).expect("cleanup pattern compiles"),
        replacement,
    }
}

fn rewrites() -> &'static [Rewrite] {
    static REWRITES: OnceLock<Vec<Rewrite>> = OnceLock::new();
    REWRITES.get_or_init(|| {
        vec![
            rewrite(r"<p>(<h[1-6][^>]*>.*?</h[1-6]>)</p>", "${1}"),
            rewrite(
                r#"<p>\s*(<div class="page-break"></div>)\s*</p>"#,
                "${1}",
            ),
            rewrite(r"(?s)<p>\s*(<table[^>]*>.*?</table>)\s*</p>", "${1}"),
            rewrite(r"<p>\s*(<ul\b[^>]*>)", "${1}"),
            rewrite(r"(</ul>)\s*</p>", "${1}"),
            rewrite(r"<p>\s*(<figure\b[^>]*>)", "${1}"),
            rewrite(r"(</figure>)\s*</p>", "${1}"),
            rewrite(
                r"<p><strong>([^:<]+:)</strong>\s*<ul>",
                "<p><strong>${1}</strong></p>\n<ul>",
            ),
        ]
    })
}

fn trailing_caption_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<figcaption>([^<]*)</figcaption></figure>\s*(?:_([^_\n]+)_|<p><em>([^<]+)</em></p>)")
            .expect("trailing caption pattern compiles")
    })
}

// An italic line after a figure is dropped only when it repeats the figure's own caption.
fn strip_duplicate_caption(caps: &Captures) -> String {
    let caption = caps.get(1).map_or("", |m| m.as_str()).trim();
    let trailing = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
        .trim();
    if trailing == caption {
        format!("<figcaption>{caption}</figcaption></figure>")
    } else {
        caps.get(0).map_or("", |m| m.as_str()).to_string()
    }
}

/// Removes paragraph wrappers around block elements and splits labels from their lists.
///
/// The block parser already avoids these shapes; this pass also repairs fragments produced
/// elsewhere. Running it on its own output changes nothing.
pub fn cleanup_html(html: &str) -> String {
    let mut out = trailing_caption_re()
        .replace_all(html, strip_duplicate_caption)
        .into_owned();
    for rule in rewrites() {
        out = rule.pattern.replace_all(&out, rule.replacement).into_owned();
    }
    out
}
