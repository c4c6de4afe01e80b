//! Input Data Verification Module
//!
//! Checks that every data file named in the configuration exists and parses,
//! before a long preparation run is started.

use chrono::Utc;
use serde::Serialize;
use std::path::Path;

use crate::config::DataConfig;
use crate::ingest::{gauge_csv, metadata};
use crate::logging::{self, Stage};
use crate::model::FloodWaveError;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub files: Vec<FileVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub partial: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileVerification {
    pub name: String,
    pub path: String,
    pub required: bool,
    pub status: VerificationStatus,
    pub exists: bool,
    /// Gauges, stations or entries read from the file.
    pub record_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    /// An optional file is missing; preparation falls back to defaults.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Per-file checks
// ============================================================================

fn verify_file(
    name: &str,
    path: &Path,
    required: bool,
    parse: impl FnOnce(&Path) -> Result<usize, FloodWaveError>,
) -> FileVerification {
    let mut result = FileVerification {
        name: name.to_string(),
        path: path.display().to_string(),
        required,
        status: VerificationStatus::Failed,
        exists: path.is_file(),
        record_count: 0,
        error_message: None,
    };

    if !result.exists {
        result.error_message = Some("file not found".to_string());
        if !required {
            result.status = VerificationStatus::PartialSuccess;
        }
        return result;
    }

    match parse(path) {
        Ok(0) => {
            result.status = VerificationStatus::PartialSuccess;
            result.error_message = Some("file holds no records".to_string());
        }
        Ok(count) => {
            result.record_count = count;
            result.status = VerificationStatus::Success;
        }
        Err(e) => result.error_message = Some(e.to_string()),
    }
    result
}

/// Checks the water level table, the station metadata, the operating
/// periods and the level groups.
pub fn verify_data_files(config: &DataConfig) -> VerificationReport {
    let river = config.river.clone();
    let files = vec![
        verify_file("water levels", &config.levels_path(), true, |p| {
            Ok(gauge_csv::read_gauge_table(p)?.columns.len())
        }),
        verify_file("station metadata", &config.meta_path(), true, move |p| {
            Ok(metadata::read_station_meta(p, &river)?.len())
        }),
        verify_file("operating periods", &config.lifetimes_path(), false, |p| {
            Ok(metadata::read_life_intervals(p)?.len())
        }),
        verify_file("level groups", &config.level_groups_path(), false, |p| {
            Ok(metadata::read_level_groups(p)?.len())
        }),
    ];

    for file in &files {
        match file.status {
            VerificationStatus::Success => logging::info(
                Stage::Ingest,
                None,
                &format!("{}: OK ({} records)", file.name, file.record_count),
            ),
            VerificationStatus::PartialSuccess => logging::warn(
                Stage::Ingest,
                None,
                &format!("{}: {}", file.name, file.error_message.as_deref().unwrap_or("incomplete")),
            ),
            VerificationStatus::Failed => logging::error(
                Stage::Ingest,
                None,
                &format!("{}: {}", file.name, file.error_message.as_deref().unwrap_or("unknown error")),
            ),
        }
    }

    let count = |status| files.iter().filter(|f| f.status == status).count();
    let summary = VerificationSummary {
        total: files.len(),
        working: count(VerificationStatus::Success),
        partial: count(VerificationStatus::PartialSuccess),
        failed: count(VerificationStatus::Failed),
    };

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        files,
        summary,
    }
}

impl VerificationReport {
    /// Whether preparation can run on these files.
    pub fn is_usable(&self) -> bool {
        self.summary.failed == 0
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    for file in &report.files {
        let mark = match file.status {
            VerificationStatus::Success => "✓",
            VerificationStatus::PartialSuccess => "⚠",
            VerificationStatus::Failed => "✗",
        };
        println!("{} {:<20} {}", mark, file.name, file.path);
        if let Some(msg) = &file.error_message {
            println!("    {}", msg);
        }
    }
    println!();
    println!(
        "Data files:   {}/{} working  ({} partial, {} failed)",
        report.summary.working, report.summary.total, report.summary.partial, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}
