// =============================================================================
// HTML renderer — styled mail body from the structured report
// =============================================================================

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};

use super::{Block, Report};

const STYLE: &str = r#"
        body { font-family: "Microsoft YaHei", Arial, sans-serif; line-height: 1.6; color: #333; max-width: 960px; margin: 0 auto; padding: 20px; }
        .header { background: linear-gradient(135deg, #1e3c72 0%, #2a5298 100%); color: #fff; padding: 20px; border-radius: 8px; margin-bottom: 24px; }
        .header h1 { margin: 0 0 6px 0; font-size: 22px; }
        .header p { margin: 0; opacity: 0.85; }
        h2 { color: #1e3c72; border-bottom: 2px solid #2a5298; padding-bottom: 4px; margin-top: 28px; font-size: 18px; }
        ul { padding-left: 22px; }
        li { margin: 4px 0; }
        .highlight { background: #fff8e1; border-left: 4px solid #ffa000; padding: 10px 14px; margin: 12px 0; font-weight: bold; }
        table { border-collapse: collapse; width: 100%; margin: 12px 0; font-size: 14px; }
        th, td { border: 1px solid #ddd; padding: 8px; text-align: right; }
        th { background-color: #f2f4f8; text-align: center; }
        td:first-child { text-align: left; }
        tr:nth-child(even) { background-color: #fafafa; }
        .footer { margin-top: 32px; padding-top: 12px; border-top: 1px solid #ddd; color: #888; font-size: 12px; }
"#;

/// Escape text for HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_block(out: &mut String, block: &Block) {
    // Writing into a String cannot fail.
    let _ = match block {
        Block::Paragraph(text) => writeln!(out, "    <p>{}</p>", escape(text)),
        Block::Highlight(text) => writeln!(out, "    <div class=\"highlight\">{}</div>", escape(text)),
        Block::Bullets(items) => {
            let lis: String = items
                .iter()
                .map(|i| format!("        <li>{}</li>\n", escape(i)))
                .collect();
            writeln!(out, "    <ul>\n{lis}    </ul>")
        }
        Block::Table { columns, rows } => {
            let head: String = columns.iter().map(|c| format!("<th>{}</th>", escape(c))).collect();
            let body: String = rows
                .iter()
                .map(|row| {
                    let cells: String = row.iter().map(|c| format!("<td>{}</td>", escape(c))).collect();
                    format!("        <tr>{cells}</tr>\n")
                })
                .collect();
            writeln!(
                out,
                "    <table>\n        <tr>{head}</tr>\n{body}    </table>"
            )
        }
    };
}

/// Render the report as a standalone HTML document.
pub fn render_html(report: &Report, stock_code: &str, generated_at: DateTime<FixedOffset>) -> String {
    let mut sections = String::new();
    for section in &report.sections {
        let _ = writeln!(sections, "    <h2>{}</h2>", escape(&section.heading));
        for block in &section.blocks {
            render_block(&mut sections, block);
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>{STYLE}    </style>
</head>
<body>
    <div class="header">
        <h1>{title}</h1>
        <p>Stock: {code} &middot; Generated: {time}</p>
    </div>
{sections}    <div class="footer">
        <p>This report is generated automatically and is for reference only. It is not investment advice.</p>
        <p>&copy; Stock Pulse</p>
    </div>
</body>
</html>
"#,
        title = escape(&report.title),
        code = escape(stock_code),
        time = generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Section;
    use chrono::TimeZone;

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 12, 15, 30, 0)
            .unwrap()
    }

    fn report() -> Report {
        Report {
            title: "Demo <Co> & Sons".to_string(),
            generated_at: at(),
            sections: vec![
                Section::new("Summary")
                    .paragraph("price > support")
                    .bullets(vec!["a \"quoted\" item".to_string()]),
                Section::new("Table")
                    .highlight("rated <b>Buy</b>")
                    .table(&["Date", "Close"], vec![vec!["2024-06-12".to_string(), "12.34".to_string()]]),
            ],
        }
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
        assert_eq!(escape("中文 plain"), "中文 plain");
    }

    #[test]
    fn report_text_is_escaped() {
        let html = render_html(&report(), "002511.SZ", at());
        assert!(html.contains("<title>Demo &lt;Co&gt; &amp; Sons</title>"));
        assert!(html.contains("<p>price &gt; support</p>"));
        assert!(html.contains("<li>a &quot;quoted&quot; item</li>"));
        assert!(html.contains("rated &lt;b&gt;Buy&lt;/b&gt;"));
        assert!(!html.contains("<b>Buy</b>"));
    }

    #[test]
    fn structure_has_headings_table_and_footer() {
        let html = render_html(&report(), "002511.SZ", at());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Stock: 002511.SZ &middot; Generated: 2024-06-12 15:30:00"));
        assert_eq!(html.matches("<h2>").count(), 2);
        assert!(html.contains("<tr><th>Date</th><th>Close</th></tr>"));
        assert!(html.contains("<tr><td>2024-06-12</td><td>12.34</td></tr>"));
        assert!(html.contains("class=\"footer\""));
        assert!(html.find("<h2>Summary</h2>") < html.find("<h2>Table</h2>"));
    }
}
