// =============================================================================
// Report model
// =============================================================================
//
// A report is an ordered list of sections, each an ordered list of typed
// blocks.  The composer builds it once per run; renderers (plain text via
// `Display`, HTML via `html::render_html`) walk the structure without any
// string sniffing.
// =============================================================================

pub mod composer;
pub mod html;

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

pub use composer::{compose, ReportInput};
pub use html::render_html;

/// Section headings in report order.
pub const SECTION_HEADINGS: [&str; 11] = [
    "Summary",
    "1. Core Technical Indicators",
    "2. Fund Flow & Volume Confirmation",
    "3. Key Support & Resistance",
    "4. Financial Health",
    "5. Market Context",
    "6. News Sentiment",
    "7. Conclusion & Composite Score",
    "8. Action Notes",
    "9. Recent Trading Days",
    "Note",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    Paragraph(String),
    Bullets(Vec<String>),
    /// Emphasised line (rating, risk warning).
    Highlight(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Paragraph(text.into()));
        self
    }

    pub fn bullets(mut self, items: Vec<String>) -> Self {
        if !items.is_empty() {
            self.blocks.push(Block::Bullets(items));
        }
        self
    }

    pub fn highlight(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Highlight(text.into()));
        self
    }

    pub fn table(mut self, columns: &[&str], rows: Vec<Vec<String>>) -> Self {
        self.blocks.push(Block::Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub generated_at: DateTime<FixedOffset>,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn headings(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.heading.as_str()).collect()
    }

    pub fn section(&self, heading: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.heading == heading)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"))?;

        for section in &self.sections {
            writeln!(f)?;
            writeln!(f, "== {} ==", section.heading)?;
            for block in &section.blocks {
                match block {
                    Block::Paragraph(text) => writeln!(f, "{text}")?,
                    Block::Bullets(items) => {
                        for item in items {
                            writeln!(f, "  - {item}")?;
                        }
                    }
                    Block::Highlight(text) => writeln!(f, ">> {text}")?,
                    Block::Table { columns, rows } => {
                        writeln!(f, "{}", columns.join(" | "))?;
                        for row in rows {
                            writeln!(f, "{}", row.join(" | "))?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
