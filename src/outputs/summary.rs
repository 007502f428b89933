//! Plain-text summary report.
//!
//! ```text
//! SPINE INDUSTRY CRAWL REPORT
//! ============================================================
//!
//! Scraping Date: 2025-03-07 09:05:01
//! Total Articles: 42
//! Method: http_renderer
//!
//! ARTICLES BY WEBSITE:
//!   Spine Market Group: 21 articles
//!   ...
//!
//! KEY INSIGHTS:
//!   • Total articles: 42
//!   • Financial mentions: 7 articles
//!   • Unique procedures: 9
//!   • Average content: 3,120 characters
//!
//! TOP PROCEDURES BY MENTIONS:
//!    1. fusion: 18 mentions
//! ```

use crate::models::{Article, CrawlResult};
use chrono::{DateTime, Local};
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const TOP_PROCEDURES: usize = 10;

/// Aggregates over a set of articles.
///
/// Counts are sorted descending; ties keep first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Insights {
    pub total: usize,
    pub by_website: Vec<(String, usize)>,
    /// Articles with at least one financial mention.
    pub with_financial: usize,
    /// Number of articles tagged with each procedure.
    pub procedures: Vec<(String, usize)>,
    pub average_content: usize,
}

impl Insights {
    pub fn from_articles(articles: &[Article]) -> Self {
        let mut by_website: Vec<(String, usize)> = Vec::new();
        let mut procedures: Vec<(String, usize)> = Vec::new();
        let mut with_financial = 0;
        let mut total_content = 0;

        for article in articles {
            bump(&mut by_website, &article.site_name);
            for procedure in &article.procedures_found {
                bump(&mut procedures, procedure);
            }
            if !article.financial_mentions.is_empty() {
                with_financial += 1;
            }
            total_content += article.content_length;
        }

        // Stable sort keeps first-seen order among equal counts.
        by_website.sort_by(|a, b| b.1.cmp(&a.1));
        procedures.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            total: articles.len(),
            by_website,
            with_financial,
            procedures,
            average_content: total_content.checked_div(articles.len()).unwrap_or(0),
        }
    }

    pub fn top_procedures(&self) -> &[(String, usize)] {
        &self.procedures[..self.procedures.len().min(TOP_PROCEDURES)]
    }
}

fn bump(counts: &mut Vec<(String, usize)>, key: &str) {
    match counts.iter_mut().find(|(k, _)| k == key) {
        Some((_, n)) => *n += 1,
        None => counts.push((key.to_string(), 1)),
    }
}

/// `1234567` → `"1,234,567"`.
pub fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render(result: &CrawlResult, at: DateTime<Local>) -> String {
    let insights = Insights::from_articles(&result.articles);
    let mut out = String::new();

    writeln!(out, "SPINE INDUSTRY CRAWL REPORT").unwrap();
    writeln!(out, "{}\n", "=".repeat(60)).unwrap();
    writeln!(out, "Scraping Date: {}", at.format("%Y-%m-%d %H:%M:%S")).unwrap();
    writeln!(out, "Total Articles: {}", insights.total).unwrap();
    writeln!(out, "Method: {}", result.method).unwrap();
    if let Some(error) = &result.aborted {
        writeln!(out, "Interrupted: {error}").unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "ARTICLES BY WEBSITE:").unwrap();
    for (website, count) in &insights.by_website {
        writeln!(out, "  {website}: {count} articles").unwrap();
    }

    writeln!(out, "\nKEY INSIGHTS:").unwrap();
    writeln!(out, "  • Total articles: {}", insights.total).unwrap();
    writeln!(out, "  • Financial mentions: {} articles", insights.with_financial).unwrap();
    writeln!(out, "  • Unique procedures: {}", insights.procedures.len()).unwrap();
    writeln!(
        out,
        "  • Average content: {} characters",
        with_thousands(insights.average_content)
    )
    .unwrap();

    if !insights.procedures.is_empty() {
        writeln!(out, "\nTOP PROCEDURES BY MENTIONS:").unwrap();
        for (i, (procedure, mentions)) in insights.top_procedures().iter().enumerate() {
            writeln!(out, "  {:2}. {procedure}: {mentions} mentions", i + 1).unwrap();
        }
    }
    out
}

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(
    result: &CrawlResult,
    at: DateTime<Local>,
    path: &Path,
) -> std::io::Result<()> {
    fs::write(path, render(result, at)).await?;
    info!("Wrote summary report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn article(site: &str, procedures: &[&str], financial: bool, len: usize) -> Article {
        Article {
            title: "t".to_string(),
            url: format!("https://{site}.example/{len}"),
            site_name: site.to_string(),
            category: "news".to_string(),
            content: String::new(),
            content_length: len,
            procedures_found: procedures.iter().map(|s| s.to_string()).collect(),
            financial_mentions: if financial {
                vec!["$1 million".to_string()]
            } else {
                vec![]
            },
            scraped_at: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_insights_counts_and_order() {
        let articles = vec![
            article("A", &["lumbar"], false, 1000),
            article("B", &["fusion", "lumbar"], true, 2000),
            article("B", &["fusion"], true, 3001),
            article("C", &["cervical"], false, 0),
        ];
        let insights = Insights::from_articles(&articles);
        assert_eq!(insights.total, 4);
        assert_eq!(
            insights.by_website,
            vec![("B".to_string(), 2), ("A".to_string(), 1), ("C".to_string(), 1)]
        );
        assert_eq!(insights.with_financial, 2);
        assert_eq!(
            insights.procedures,
            vec![
                ("lumbar".to_string(), 2),
                ("fusion".to_string(), 2),
                ("cervical".to_string(), 1),
            ]
        );
        assert_eq!(insights.average_content, 1500);
    }

    #[test]
    fn test_empty_result_has_zero_average() {
        let insights = Insights::from_articles(&[]);
        assert_eq!(insights.average_content, 0);
        assert!(insights.top_procedures().is_empty());
    }

    #[test]
    fn test_with_thousands() {
        assert_eq!(with_thousands(0), "0");
        assert_eq!(with_thousands(999), "999");
        assert_eq!(with_thousands(1000), "1,000");
        assert_eq!(with_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_render_layout() {
        let result = CrawlResult {
            articles: vec![
                article("A", &["lumbar"], true, 1500),
                article("A", &["lumbar", "fusion"], false, 1500),
            ],
            method: "scripted".to_string(),
            ..CrawlResult::default()
        };
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let text = render(&result, at);

        assert!(text.starts_with("SPINE INDUSTRY CRAWL REPORT\n"));
        assert!(text.contains("Scraping Date: 2025-03-07 09:05:01\n"));
        assert!(text.contains("Method: scripted\n"));
        assert!(text.contains("  A: 2 articles\n"));
        assert!(text.contains("  • Financial mentions: 1 articles\n"));
        assert!(text.contains("  • Unique procedures: 2\n"));
        assert!(text.contains("  • Average content: 1,500 characters\n"));
        assert!(text.contains("   1. lumbar: 2 mentions\n"));
        assert!(text.contains("   2. fusion: 1 mentions\n"));
        assert!(!text.contains("Interrupted"));
    }

    #[test]
    fn test_render_notes_interrupted_run_without_procedures() {
        let result = CrawlResult {
            articles: vec![article("A", &[], false, 900)],
            method: "scripted".to_string(),
            aborted: Some(crate::error::CrawlError::Cancelled),
            ..CrawlResult::default()
        };
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        let text = render(&result, at);

        assert!(text.contains("Method: scripted\nInterrupted: crawl cancelled\n\nARTICLES BY WEBSITE:\n"));
        assert!(text.ends_with("  • Average content: 900 characters\n"));
        assert!(!text.contains("TOP PROCEDURES"));
    }

    #[test]
    fn test_top_procedures_capped_at_ten() {
        let names: Vec<String> = (0..14).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let insights = Insights::from_articles(&[article("A", &refs, false, 1)]);
        assert_eq!(insights.procedures.len(), 14);
        assert_eq!(insights.top_procedures().len(), 10);
    }
}
