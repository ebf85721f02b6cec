// src/utils/html_debug.rs
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use regex::Regex;

use crate::extractors::context::ReportContext;
use crate::extractors::rights::RIGHTS_KEYWORDS;
use crate::extractors::shareholders::SHAREHOLDER_KEYWORDS;
use crate::utils::error::AppError;

const STATEMENT_KEYWORDS: [&str; 6] = [
    "Income Statement",
    "CONSOLIDATED INCOME STATEMENT",
    "Group Income Statement",
    "STATEMENT OF PROFIT OR LOSS",
    "Summary Indicators",
    "EARNINGS PER SHARE",
];

/// Saves page text as an HTML file with the given byte ranges highlighted.
pub fn save_debug_html(text: &str, filename: &Path, highlights: &[(usize, usize, &str)]) -> Result<(), AppError> {
    let mut file = File::create(filename)?;

    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
    debug_html.push_str("body { white-space: pre-wrap; font-family: monospace; }\n");
    debug_html.push_str(".highlight-statement { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-shareholders { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-rights { background-color: #FFA500; }\n");
    debug_html.push_str(".highlight-custom { background-color: #FFC0CB; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    let mut last_pos = 0;
    let mut sorted_highlights = highlights.to_vec();
    sorted_highlights.sort_by_key(|h| h.0);

    for (start, end, highlight_type) in sorted_highlights {
        // Overlapping matches keep the earlier highlight
        if start < last_pos {
            continue;
        }
        debug_html.push_str(&escape(&text[last_pos..start]));

        let css_class = match highlight_type {
            "statement" => "highlight-statement",
            "shareholders" => "highlight-shareholders",
            "rights" => "highlight-rights",
            _ => "highlight-custom",
        };
        debug_html.push_str(&format!(
            "<span class=\"{}\" title=\"Position: {}-{}, Type: {}\">",
            css_class, start, end, highlight_type
        ));
        debug_html.push_str(&escape(&text[start..end]));
        debug_html.push_str("</span>");

        last_pos = end;
    }
    debug_html.push_str(&escape(&text[last_pos..]));
    debug_html.push_str("\n</body>\n</html>");

    file.write_all(debug_html.as_bytes())?;
    tracing::debug!("Saved debug HTML to {}", filename.display());
    Ok(())
}

/// Highlights every match of each `(pattern, type)` pair.
pub fn create_debug_html(text: &str, filename: &Path, patterns: &[(String, &str)]) -> Result<(), AppError> {
    let mut highlights = Vec::new();
    for (pattern, highlight_type) in patterns {
        let re = Regex::new(pattern)
            .map_err(|e| AppError::Config(format!("Invalid regex pattern '{}': {}", pattern, e)))?;
        for mat in re.find_iter(text) {
            highlights.push((mat.start(), mat.end(), *highlight_type));
        }
    }
    save_debug_html(text, filename, &highlights)
}

/// Writes `<dir>/<document id>/page_<n>.html` for every page the resolvers
/// locate, with all section keywords highlighted.
pub fn dump_located_pages(dir: &Path, ctx: &ReportContext) -> Result<usize, AppError> {
    let groups: [(&[&str], &str); 3] = [
        (&STATEMENT_KEYWORDS, "statement"),
        (&SHAREHOLDER_KEYWORDS, "shareholders"),
        (&RIGHTS_KEYWORDS, "rights"),
    ];

    let patterns: Vec<(String, &str)> = groups
        .iter()
        .flat_map(|(keywords, kind)| keywords.iter().map(move |kw| (format!("(?i){}", regex::escape(kw)), *kind)))
        .collect();

    let mut numbers = BTreeSet::new();
    for (keywords, _) in &groups {
        for kw in keywords.iter() {
            numbers.extend(ctx.keyword_pages(kw).iter().map(|p| p.number));
        }
    }

    let target = dir.join(&ctx.document.id);
    fs::create_dir_all(&target)?;
    for number in &numbers {
        if let Some(page) = ctx.document.page(*number) {
            create_debug_html(&page.text, &target.join(format!("page_{}.html", number)), &patterns)?;
        }
    }
    tracing::info!("Wrote {} debug page(s) to {}", numbers.len(), target.display());
    Ok(numbers.len())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::document::{Document, Page};
    use crate::extractors::tables::StrategyChain;
    use crate::fiscal::FiscalPeriod;

    #[test]
    fn highlights_are_wrapped_and_text_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        let patterns = vec![("(?i)income statement".to_string(), "statement")];
        create_debug_html("Group <b> Income Statement", &path, &patterns).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Group &lt;b&gt; <span class=\"highlight-statement\""));
        assert!(html.contains(">Income Statement</span>"));
    }

    #[test]
    fn dumps_only_located_pages() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Document::new(
            "report_20-21",
            FiscalPeriod::starting(2020),
            vec![
                Page::new(1, "Chairman's review"),
                Page::new(2, "Income Statement\nRevenue  100"),
                Page::new(3, "Twenty Largest Shareholders"),
            ],
        );
        let config = ExtractorConfig::default();
        let chain = StrategyChain::standard();
        let ctx = ReportContext::new(&doc, &config, &chain);
        let written = dump_located_pages(dir.path(), &ctx).unwrap();
        assert_eq!(written, 2);
        assert!(dir.path().join("report_20-21/page_2.html").exists());
        assert!(!dir.path().join("report_20-21/page_1.html").exists());
    }
}
