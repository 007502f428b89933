//! CSV export of crawled articles.
//!
//! One row per article, RFC 4180 quoting. List fields are joined with
//! `", "`; `content` is left to the JSON export.

use crate::models::Article;
use chrono::SecondsFormat;
use std::io::{self, Write};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const HEADER: [&str; 8] = [
    "title",
    "url",
    "website_name",
    "category",
    "content_length",
    "spine_procedures",
    "financial_mentions",
    "scraped_at",
];

pub const LIST_SEPARATOR: &str = ", ";

/// Write `articles` to `path`, header first.
#[instrument(level = "info", skip_all, fields(path = %path.display(), articles = articles.len()))]
pub async fn write_articles(articles: &[Article], path: &Path) -> io::Result<()> {
    let text = to_csv_string(articles)?;
    fs::write(path, text).await?;
    info!("Wrote CSV export");
    Ok(())
}

pub fn to_csv_string(articles: &[Article]) -> io::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    write_row(&mut buf, &HEADER)?;
    for article in articles {
        write_row(&mut buf, &article_row(article))?;
    }
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn article_row(article: &Article) -> [String; 8] {
    [
        article.title.clone(),
        article.url.clone(),
        article.site_name.clone(),
        article.category.clone(),
        article.content_length.to_string(),
        article.procedures_found.join(LIST_SEPARATOR),
        article.financial_mentions.join(LIST_SEPARATOR),
        article.scraped_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    ]
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write one comma-separated row, quoting where needed.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, ",")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    write!(w, "\r\n")
}
