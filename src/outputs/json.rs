//! JSON rundown writer.
//!
//! Serializes the final group list plus run statistics to
//! `{output_dir}/{date}/{edition}.json`.

use crate::models::SourceGroup;
use crate::pipeline::RunReport;
use crate::utils::time_of_day;
use chrono::{Local, Utc};
use serde::Serialize;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// The document the downstream narration stage consumes.
#[derive(Debug, Serialize)]
pub struct Rundown<'a> {
    pub local_date: String,
    pub time_of_day: String,
    pub generated_at: String,
    pub groups: &'a [SourceGroup],
    pub report: &'a RunReport,
}

/// Write one run's rundown; returns the path written.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_rundown(
    groups: &[SourceGroup],
    report: &RunReport,
    output_dir: &str,
) -> Result<String, Box<dyn Error>> {
    let edition = time_of_day();
    let date = Local::now().date_naive().to_string();

    let rundown = Rundown {
        local_date: date.clone(),
        time_of_day: edition.clone(),
        generated_at: Utc::now().to_rfc3339(),
        groups,
        report,
    };
    let json = serde_json::to_string_pretty(&rundown)?;

    let dir = format!("{}/{}", output_dir.trim_end_matches('/'), date);
    fs::create_dir_all(&dir).await?;
    let path = format!("{dir}/{edition}.json");
    fs::write(&path, json).await?;
    info!(%path, groups = groups.len(), "wrote rundown");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleItem, SourceType};

    #[tokio::test]
    async fn writes_rundown_file() {
        let out_dir = std::env::temp_dir().join(format!(
            "nyhetssvep-rundown-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&out_dir);

        let mut group = SourceGroup::new("SVT", SourceType::Rss, 1);
        group
            .items
            .push(ArticleItem::new("En rubrik", "https://ex.se/a").unwrap());
        let report = RunReport {
            strict: false,
            escalated: false,
            thin_ratio: 0.0,
            attempted_items: 1,
            dedupe: Vec::new(),
        };

        let path = write_rundown(&[group], &report, out_dir.to_str().unwrap())
            .await
            .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("En rubrik"));
        assert!(written.contains("local_date"));
        assert!(path.ends_with(".json"));

        let _ = std::fs::remove_dir_all(&out_dir);
    }
}
