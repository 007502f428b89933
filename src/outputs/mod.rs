//! Export of crawl results.
//!
//! # Submodules
//!
//! - [`csv`]: one row per article, for spreadsheets
//! - [`json`]: the full result including article content
//! - [`summary`]: human-readable report with per-site counts and top procedures
//!
//! # Output Structure
//!
//! Every export of one run shares a timestamp suffix:
//!
//! ```text
//! spine_industry_data/
//! ├── industry_articles_20250307_090501.csv
//! ├── industry_articles_20250307_090501.json
//! └── crawl_summary_20250307_090501.txt
//! ```

pub mod csv;
pub mod json;
pub mod summary;

use crate::error::CrawlError;
use crate::models::CrawlResult;
use crate::utils::{ensure_writable_dir, export_timestamp};
use chrono::{Local, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub const ARTICLES_PREFIX: &str = "industry_articles_";
pub const SUMMARY_PREFIX: &str = "crawl_summary_";

/// Data lines of the latest CSV shown by the control panel.
pub const PREVIEW_ROWS: usize = 5;

/// Where one export landed.
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub summary: PathBuf,
}

/// Write the CSV, JSON and summary exports of `result` into `dir`.
///
/// The directory is created on demand. Writes stop at the first failure.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), articles = result.articles.len()))]
pub async fn export_all(result: &CrawlResult, dir: &Path) -> Result<ExportPaths, CrawlError> {
    if let Err(e) = ensure_writable_dir(dir).await {
        error!(error = %e, "Output directory is not writable");
        return Err(e.into());
    }

    let local = Local::now();
    let stamp = export_timestamp(local);
    let paths = ExportPaths {
        csv: dir.join(format!("{ARTICLES_PREFIX}{stamp}.csv")),
        json: dir.join(format!("{ARTICLES_PREFIX}{stamp}.json")),
        summary: dir.join(format!("{SUMMARY_PREFIX}{stamp}.txt")),
    };

    csv::write_articles(&result.articles, &paths.csv).await?;
    json::write_result(result, local.with_timezone(&Utc), &paths.json).await?;
    summary::write_summary(result, local, &paths.summary).await?;

    info!(csv = %paths.csv.display(), "Export complete");
    Ok(paths)
}

/// A peek at a CSV export, as served by `/api/results`.
///
/// Lines are passed through as written, quoting included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvPreview {
    pub file: String,
    pub header: String,
    pub sample_data: Vec<String>,
    /// Physical lines in the file, header included.
    pub total_lines: usize,
}

/// Preview the most recent `industry_articles_*.csv` in `dir`.
///
/// File names embed a sortable timestamp, so the greatest name is the
/// latest. Returns `Ok(None)` when the directory holds no export.
#[instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
pub async fn latest_csv_preview(dir: &Path) -> Result<Option<CsvPreview>, CrawlError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<String> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(ARTICLES_PREFIX)
            && name.ends_with(".csv")
            && latest.as_ref().is_none_or(|l| name > *l)
        {
            latest = Some(name);
        }
    }

    let Some(file) = latest else {
        return Ok(None);
    };
    debug!(%file, "Latest CSV export");

    let text = fs::read_to_string(dir.join(&file)).await?;
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default().to_string();
    let sample_data = lines.take(PREVIEW_ROWS).map(String::from).collect();

    Ok(Some(CsvPreview {
        file,
        header,
        sample_data,
        total_lines: text.lines().count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Article;
    use std::collections::BTreeMap;

    fn result(n: usize) -> CrawlResult {
        let articles = (0..n)
            .map(|i| Article {
                title: format!("Story {i}"),
                url: format!("https://medtech.example/news/{i}"),
                site_name: "MedTech".to_string(),
                category: "industry_news".to_string(),
                content: "Lumbar fusion".to_string(),
                content_length: 13,
                procedures_found: vec!["fusion".to_string(), "lumbar".to_string()],
                financial_mentions: vec![],
                scraped_at: Utc::now(),
                extra: BTreeMap::new(),
            })
            .collect();
        CrawlResult {
            articles,
            method: "scripted".to_string(),
            source_websites: vec!["MedTech".to_string()],
            aborted: None,
        }
    }

    #[tokio::test]
    async fn test_export_all_writes_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let paths = export_all(&result(2), &out).await.unwrap();

        for path in [&paths.csv, &paths.json, &paths.summary] {
            assert!(path.is_file(), "{} missing", path.display());
        }
        let csv_name = paths.csv.file_name().unwrap().to_string_lossy().into_owned();
        assert!(csv_name.starts_with("industry_articles_"));
        // industry_articles_YYYYMMDD_HHMMSS.csv
        assert_eq!(csv_name.len(), ARTICLES_PREFIX.len() + 15 + 4);
        assert!(paths
            .summary
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("crawl_summary_"));
    }

    #[tokio::test]
    async fn test_preview_of_missing_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let preview = latest_csv_preview(&dir.path().join("nope")).await.unwrap();
        assert!(preview.is_none());
    }

    #[tokio::test]
    async fn test_preview_picks_latest_and_samples_five() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("industry_articles_20240101_000000.csv"),
            "title\r\nold\r\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("industry_articles_20250101_000000.csv"),
            csv::to_csv_string(&result(8).articles).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("crawl_summary_20260101_000000.txt"), "x").unwrap();

        let preview = latest_csv_preview(dir.path()).await.unwrap().unwrap();
        assert_eq!(preview.file, "industry_articles_20250101_000000.csv");
        assert_eq!(preview.header, csv::HEADER.join(","));
        assert_eq!(preview.sample_data.len(), PREVIEW_ROWS);
        assert!(preview.sample_data[0].starts_with("Story 0,https://medtech.example/news/0,"));
        assert_eq!(preview.total_lines, 9);
    }

    #[tokio::test]
    async fn test_preview_keeps_lines_as_written() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("industry_articles_20250307_090501.csv"),
            "title,url\r\n\"Fusion, revisited\",https://a.example/\r\n\"Two\nlines\",https://b.example/\r\n",
        )
        .unwrap();

        let preview = latest_csv_preview(dir.path()).await.unwrap().unwrap();
        assert_eq!(preview.header, "title,url");
        assert_eq!(
            preview.sample_data,
            vec![
                "\"Fusion, revisited\",https://a.example/",
                "\"Two",
                "lines\",https://b.example/",
            ]
        );
        assert_eq!(preview.total_lines, 4);
    }

    #[tokio::test]
    async fn test_preview_without_exports_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(latest_csv_preview(dir.path()).await.unwrap().is_none());
    }
}
