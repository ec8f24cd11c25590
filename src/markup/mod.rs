//! Markdown-to-HTML transformer for report templates.
//!
//! Text is first parsed into block-level variants, then rendered. Tables, lists, figures and
//! raw block HTML never end up inside a paragraph because they are separate blocks before
//! any markup is emitted.

mod cleanup;
mod figure;
mod inline;
mod table;

pub use cleanup::cleanup_html;
pub use figure::{CaptionSource, Figure, default_caption};
pub use inline::render_inline;
pub use table::Table;

use crate::error::{MarkupError, ReportError};
use calm_report_contract::PAGE_BREAK_MARKER;

const BLOCK_TAGS: [&str; 7] = ["ul", "ol", "table", "figure", "div", "section", "blockquote"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Table(Table),
    Figure(Figure),
    List { ordered: bool, items: Vec<String> },
    PageBreak,
    Html(String),
    Paragraph(String),
}

impl Block {
    pub fn render(&self) -> String {
        match self {
            Block::Heading { level, text } => {
                format!("<h{level}>{}</h{level}>", render_inline(text))
            }
            Block::Table(table) => table.render(),
            Block::Figure(figure) => figure.render(),
            Block::List { ordered, items } => {
                let tag = if *ordered { "ol" } else { "ul" };
                let mut out = format!("<{tag}>\n");
                for item in items {
                    out.push_str("<li>");
                    out.push_str(&render_inline(item));
                    out.push_str("</li>\n");
                }
                out.push_str(&format!("</{tag}>"));
                out
            }
            Block::PageBreak => PAGE_BREAK_MARKER.to_string(),
            Block::Html(html) => html.clone(),
            Block::Paragraph(text) => format!("<p>{}</p>", render_inline(text)),
        }
    }
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    Some((hashes as u8, rest.trim()))
}

fn list_item(line: &str) -> Option<(bool, &str)> {
    for bullet in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some((false, rest.trim()));
        }
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(item) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some((true, item.trim()));
        }
    }
    None
}

fn is_page_break(line: &str) -> bool {
    line == PAGE_BREAK_MARKER
}

fn find_open_tag(haystack: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut pos = from;
    while let Some(found) = haystack[pos..].find(&needle) {
        let start = pos + found;
        let after = haystack[start + needle.len()..].chars().next();
        if matches!(after, Some('>') | Some('/') | Some(' ') | Some('\n') | Some('\t')) {
            return Some(start);
        }
        pos = start + needle.len();
    }
    None
}

fn find_block_end(haystack: &str, tag: &str, open: usize) -> Option<usize> {
    let close = format!("</{tag}>");
    let mut depth = 1usize;
    let mut pos = open + 1;
    loop {
        let next_close = haystack[pos..].find(&close).map(|i| pos + i)?;
        match find_open_tag(haystack, tag, pos) {
            Some(next_open) if next_open < next_close => {
                depth += 1;
                pos = next_open + 1;
            }
            _ => {
                depth -= 1;
                pos = next_close + close.len();
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }
}

/// Splits paragraph text around embedded block-level HTML so it is never wrapped in `<p>`.
fn split_block_html(text: &str, blocks: &mut Vec<Block>) {
    let mut rest = text;
    loop {
        let next = BLOCK_TAGS
            .iter()
            .filter_map(|tag| find_open_tag(rest, tag, 0).map(|at| (at, *tag)))
            .min_by_key(|(at, _)| *at);
        let Some((start, tag)) = next else { break };
        let Some(end) = find_block_end(rest, tag, start) else { break };
        let before = rest[..start].trim();
        if !before.is_empty() {
            blocks.push(Block::Paragraph(before.to_string()));
        }
        blocks.push(Block::Html(rest[start..end].to_string()));
        rest = &rest[end..];
    }
    let tail = rest.trim();
    if !tail.is_empty() {
        blocks.push(Block::Paragraph(tail.to_string()));
    }
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n");
    lines.clear();
    split_block_html(&text, blocks);
}

/// Parses markdown text into block-level variants.
pub fn parse_blocks(text: &str) -> Result<Vec<Block>, MarkupError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            idx += 1;
            continue;
        }

        if is_page_break(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::PageBreak);
            idx += 1;
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading {
                level,
                text: text.to_string(),
            });
            idx += 1;
            continue;
        }

        if line.contains('|') {
            let end = idx
                + lines[idx..]
                    .iter()
                    .take_while(|candidate| candidate.contains('|'))
                    .count();
            if end - idx >= 2 && table::is_separator(lines[idx + 1]) {
                flush_paragraph(&mut paragraph, &mut blocks);
                blocks.push(Block::Table(Table::parse(&lines[idx..end], idx + 1)?));
                idx = end;
                continue;
            }
        }

        if let Some((figure, consumed)) = Figure::parse(line, &lines[idx + 1..], idx + 1)? {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Figure(figure));
            idx += 1 + consumed;
            continue;
        }

        if let Some((ordered, first)) = list_item(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            let mut items = vec![first.to_string()];
            idx += 1;
            while idx < lines.len() {
                match list_item(lines[idx].trim()) {
                    Some((same, item)) if same == ordered => {
                        items.push(item.to_string());
                        idx += 1;
                    }
                    _ => break,
                }
            }
            blocks.push(Block::List { ordered, items });
            continue;
        }

        paragraph.push(trimmed);
        idx += 1;
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    Ok(blocks)
}

pub fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Converts substituted markdown into a self-contained HTML fragment.
pub fn to_html(text: &str) -> Result<String, ReportError> {
    let blocks = parse_blocks(text)?;
    let figures = blocks
        .iter()
        .filter(|block| matches!(block, Block::Figure(_)))
        .count();
    let tables = blocks
        .iter()
        .filter(|block| matches!(block, Block::Table(_)))
        .count();
    tracing::info!(blocks = blocks.len(), figures, tables, "converted markdown to html");
    Ok(cleanup_html(&render_blocks(&blocks)))
}
