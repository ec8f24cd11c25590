use super::{Findings, PageCountMethod};
use calm_report_contract::{
    ACCENT_CLASS, MAX_ACCENTS_PER_PAGE, PAGE_BREAK_CLASS, SO_WHAT_PHRASE, TARGET_PAGE_COUNT,
};
use kuchiki::{ElementData, NodeRef};
use regex_lite::Regex;
use std::sync::OnceLock;

const UNIT_HINTS: [&str; 6] = ["$", "%", "hours", "days", "weeks", "months"];
const UNITLESS_HEADERS: [&str; 12] = [
    "name",
    "title",
    "description",
    "scenario",
    "initiative",
    "owner",
    "metric",
    "responsible",
    "accountable",
    "support",
    "consulted",
    "informed",
];

fn page_break_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"page-break-before:\s*always").expect("page break style pattern compiles")
    })
}

fn tag_is(element: &ElementData, tag: &str) -> bool {
    element.name.local.as_ref().eq_ignore_ascii_case(tag)
}

fn has_class(element: &ElementData, class: &str) -> bool {
    element
        .attributes
        .borrow()
        .get("class")
        .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
}

fn has_page_break_style(element: &ElementData) -> bool {
    element
        .attributes
        .borrow()
        .get("style")
        .is_some_and(|style| page_break_style_re().is_match(style))
}

fn elements(node: &NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
    node.descendants().filter(|n| n.as_element().is_some())
}

fn child_elements<'a>(node: &'a NodeRef, tag: &'a str) -> impl Iterator<Item = NodeRef> + 'a {
    elements(node).filter(move |n| n.as_element().is_some_and(|el| tag_is(el, tag)))
}

/// Body text with whitespace collapsed to single spaces.
pub(super) fn visible_text(document: &NodeRef) -> String {
    let text = match document.select_first("body") {
        Ok(body) => body.as_node().text_contents(),
        Err(()) => document.text_contents(),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy)]
pub(super) struct PageCount {
    pub count: usize,
    pub method: PageCountMethod,
}

fn is_page_boundary(element: &ElementData, method: PageCountMethod, seen_h2: bool) -> bool {
    match method {
        PageCountMethod::Markers => has_class(element, PAGE_BREAK_CLASS),
        PageCountMethod::InlineStyle => has_page_break_style(element),
        PageCountMethod::Headings => tag_is(element, "h2") && seen_h2,
    }
}

pub(super) fn check_page_count(document: &NodeRef, findings: &mut Findings) -> PageCount {
    const RULE: &str = "layout.page_count_target";
    const ESTIMATE_RULE: &str = "layout.page_count_estimated";
    findings.checked(RULE);
    findings.checked(ESTIMATE_RULE);

    let mut markers = 0;
    let mut styled = 0;
    let mut headings = 0;
    for node in elements(document) {
        let Some(element) = node.as_element() else {
            continue;
        };
        if has_class(element, PAGE_BREAK_CLASS) {
            markers += 1;
        }
        if has_page_break_style(element) {
            styled += 1;
        }
        if tag_is(element, "h2") {
            headings += 1;
        }
    }

    let pages = if markers > 0 {
        PageCount {
            count: markers + 1,
            method: PageCountMethod::Markers,
        }
    } else if styled > 0 {
        PageCount {
            count: styled + 1,
            method: PageCountMethod::InlineStyle,
        }
    } else {
        findings.warning(
            ESTIMATE_RULE,
            format!(
                "page count estimated from {headings} <h2> headings; no page-break markers found"
            ),
        );
        PageCount {
            count: headings,
            method: PageCountMethod::Headings,
        }
    };

    if pages.count != TARGET_PAGE_COUNT {
        findings.error(
            RULE,
            format!(
                "page count is {}, expected exactly {TARGET_PAGE_COUNT} (page-breaks: {markers})",
                pages.count
            ),
        );
    }
    pages
}

pub(super) fn check_accents_per_page(
    document: &NodeRef,
    method: PageCountMethod,
    findings: &mut Findings,
) {
    const RULE: &str = "brand.accent_per_page";
    findings.checked(RULE);

    let mut per_page = vec![0usize];
    let mut seen_h2 = false;
    for node in elements(document) {
        let Some(element) = node.as_element() else {
            continue;
        };
        if is_page_boundary(element, method, seen_h2) {
            per_page.push(0);
        }
        if tag_is(element, "h2") {
            seen_h2 = true;
        }
        if has_class(element, ACCENT_CLASS) {
            if let Some(count) = per_page.last_mut() {
                *count += 1;
            }
        }
    }

    for (idx, count) in per_page.iter().enumerate() {
        if *count > MAX_ACCENTS_PER_PAGE {
            findings.error(
                RULE,
                format!(
                    "page {} has {count} teal accents, max {MAX_ACCENTS_PER_PAGE} allowed",
                    idx + 1
                ),
            );
        }
    }
}

pub(super) fn check_figure_captions(document: &NodeRef, findings: &mut Findings) {
    const RULE: &str = "figures.caption_so_what";
    findings.checked(RULE);
    for (idx, figure) in child_elements(document, "figure").enumerate() {
        match child_elements(&figure, "figcaption").next() {
            None => findings.error(RULE, format!("figure {} missing figcaption", idx + 1)),
            Some(caption) => {
                if !caption
                    .text_contents()
                    .to_lowercase()
                    .contains(SO_WHAT_PHRASE)
                {
                    findings.error(
                        RULE,
                        format!("figure {} caption missing '{SO_WHAT_PHRASE}' pattern", idx + 1),
                    );
                }
            }
        }
    }
}

fn cell_texts(row: &NodeRef, tag: &str) -> Vec<String> {
    child_elements(row, tag)
        .map(|cell| cell.text_contents().trim().to_string())
        .collect()
}

fn header_cells(table: &NodeRef) -> Vec<String> {
    cell_texts(table, "th")
}

fn count_names(cell: &str) -> usize {
    cell.split(',').filter(|name| !name.trim().is_empty()).count()
}

pub(super) fn check_responsibility_matrix(document: &NodeRef, findings: &mut Findings) {
    const RULE: &str = "matrix.role_counts";
    findings.checked(RULE);
    for table in child_elements(document, "table") {
        let headers: Vec<String> = header_cells(&table)
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        let responsible = headers.iter().position(|h| h.contains("responsible"));
        let accountable = headers.iter().position(|h| h.contains("accountable"));
        let (Some(responsible), Some(accountable)) = (responsible, accountable) else {
            continue;
        };

        let rows = child_elements(&table, "tr")
            .filter(|row| child_elements(row, "th").next().is_none());
        for (idx, row) in rows.enumerate() {
            let cells = cell_texts(&row, "td");
            let r_count = cells.get(responsible).map(|c| count_names(c)).unwrap_or(0);
            let a_count = cells.get(accountable).map(|c| count_names(c)).unwrap_or(0);
            if a_count != 1 {
                findings.error(
                    RULE,
                    format!(
                        "responsibilities row {}: accountable count is {a_count}, expected 1",
                        idx + 1
                    ),
                );
            }
            if r_count == 0 {
                findings.error(
                    RULE,
                    format!(
                        "responsibilities row {}: responsible count is 0, expected at least 1",
                        idx + 1
                    ),
                );
            }
        }
    }
}

fn header_has_unit(header: &str) -> bool {
    let lower = header.to_lowercase();
    UNIT_HINTS.iter().any(|unit| lower.contains(unit))
        || UNITLESS_HEADERS.iter().any(|word| lower.contains(word))
}

pub(super) fn check_table_headers(document: &NodeRef, findings: &mut Findings) {
    const RULE: &str = "tables.header_units";
    findings.checked(RULE);
    for (idx, table) in child_elements(document, "table").enumerate() {
        let headers = header_cells(&table);
        if headers.is_empty() {
            findings.warning(RULE, format!("table {} missing header row", idx + 1));
            continue;
        }
        for header in headers {
            if !header.is_empty() && !header_has_unit(&header) {
                findings.warning(
                    RULE,
                    format!("table {} header '{header}' may be missing units", idx + 1),
                );
            }
        }
    }
}

pub(super) fn check_svg_accessibility(document: &NodeRef, findings: &mut Findings) {
    const RULE: &str = "figures.svg_accessibility";
    findings.checked(RULE);
    for (idx, svg) in child_elements(document, "svg").enumerate() {
        if child_elements(&svg, "title").next().is_none() {
            findings.warning(RULE, format!("SVG {} missing <title> element", idx + 1));
        }
        if child_elements(&svg, "desc").next().is_none() {
            findings.warning(RULE, format!("SVG {} missing <desc> element", idx + 1));
        }
    }
}
