use crate::error::MarkupError;
use crate::markup::inline::render_inline;
use regex_lite::Regex;
use std::sync::OnceLock;

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\|[\s\-:]+\|").expect("separator pattern compiles"))
}

pub fn is_separator(line: &str) -> bool {
    separator_re().is_match(line)
}

pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|cell| cell.trim().to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses a run of pipe lines: header, separator, then body rows. `first_line` is the
    /// 1-based source line of the header, used in errors.
    pub fn parse(lines: &[&str], first_line: usize) -> Result<Self, MarkupError> {
        let header = lines.first().map(|line| split_cells(line)).unwrap_or_default();
        let mut rows = Vec::new();
        for (idx, line) in lines.iter().enumerate().skip(2) {
            let cells = split_cells(line);
            if cells.len() != header.len() {
                return Err(MarkupError::RaggedTable {
                    line: first_line,
                    row: idx - 1,
                    expected: header.len(),
                    found: cells.len(),
                });
            }
            rows.push(cells);
        }
        Ok(Self { header, rows })
    }

    pub fn render(&self) -> String {
        let mut html = vec!["<table>", "<thead>", "<tr>"]
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for cell in &self.header {
            html.push(format!("<th>{}</th>", render_inline(cell)));
        }
        html.push("</tr>".to_string());
        html.push("</thead>".to_string());
        if !self.rows.is_empty() {
            html.push("<tbody>".to_string());
            for row in &self.rows {
                html.push("<tr>".to_string());
                for cell in row {
                    html.push(format!("<td>{}</td>", render_inline(cell)));
                }
                html.push("</tr>".to_string());
            }
            html.push("</tbody>".to_string());
        }
        html.push("</table>".to_string());
        html.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_detection() {
        assert!(is_separator("|---|:---:|"));
        assert!(is_separator("  | --- | --- |"));
        assert!(!is_separator("| a | b |"));
    }

    #[test]
    fn renders_one_header_row_and_every_body_row() {
        let lines = ["| Scenario | Cost ($) |", "|---|---|", "| base | $10 |", "| high | $20 |", "| low | $5 |"];
        let table = Table::parse(&lines, 1).expect("table");
        let html = table.render();
        assert_eq!(html.matches("<tr>").count(), 4);
        assert_eq!(html.matches("<th>").count(), 2);
        assert!(html.contains("<td>$20</td>"));
    }

    #[test]
    fn ragged_row_is_rejected() {
        let lines = ["| a | b |", "|---|---|", "| 1 | 2 |", "| 3 |"];
        let err = Table::parse(&lines, 7).expect_err("ragged");
        assert_eq!(
            err,
            MarkupError::RaggedTable {
                line: 7,
                row: 2,
                expected: 2,
                found: 1
            }
        );
    }
}
