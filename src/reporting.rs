//! Summaries and exports over stored audit results.

use std::fmt::Write as _;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::{self, BucketTally};
use crate::db::DatabaseError;

// ═══════════════════════════════════════════
// Report
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DepartmentReport {
    pub bucket: String,
    pub department: String,
    pub patients: usize,
    pub pairs_checked: usize,
    pub high_risk_interactions: usize,
    pub patients_at_risk: usize,
}

impl From<BucketTally> for DepartmentReport {
    fn from(t: BucketTally) -> Self {
        Self {
            bucket: t.bucket,
            department: t.department,
            patients: t.patients,
            pairs_checked: t.rows,
            high_risk_interactions: t.high_risk_rows,
            patients_at_risk: t.patients_at_risk,
        }
    }
}

/// Headline metrics plus per-department tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub total_patients_audited: usize,
    pub drug_pairs_checked: usize,
    pub high_risk_interactions: usize,
    pub patients_at_risk: usize,
    pub departments: Vec<DepartmentReport>,
}

/// Patients belong to exactly one department, so per-bucket patient counts
/// add up to the overall count.
pub fn build_report(audit_conn: &Connection) -> Result<AuditReport, DatabaseError> {
    let departments: Vec<DepartmentReport> = repository::tally_buckets(audit_conn)?
        .into_iter()
        .map(DepartmentReport::from)
        .collect();

    Ok(AuditReport {
        total_patients_audited: departments.iter().map(|d| d.patients).sum(),
        drug_pairs_checked: departments.iter().map(|d| d.pairs_checked).sum(),
        high_risk_interactions: departments.iter().map(|d| d.high_risk_interactions).sum(),
        patients_at_risk: departments.iter().map(|d| d.patients_at_risk).sum(),
        departments,
    })
}

pub fn render_report(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Patients Audited:  {}", report.total_patients_audited);
    let _ = writeln!(out, "Drug Pairs Checked:      {}", report.drug_pairs_checked);
    let _ = writeln!(out, "High-Risk Interactions:  {}", report.high_risk_interactions);
    let _ = writeln!(out, "Patients at Risk:        {}", report.patients_at_risk);

    if report.departments.is_empty() {
        let _ = writeln!(out, "\nNo audit results found.");
        return out;
    }

    let _ = writeln!(
        out,
        "\n{:<20} {:>8} {:>8} {:>10} {:>8}",
        "Department", "Patients", "Pairs", "High-risk", "At risk"
    );
    for d in &report.departments {
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>8} {:>10} {:>8}",
            d.department, d.patients, d.pairs_checked, d.high_risk_interactions, d.patients_at_risk
        );
    }
    out
}

// ═══════════════════════════════════════════
// High-risk export
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Rows exported per bucket, including buckets with none.
    pub buckets: Vec<(String, usize)>,
    pub total: usize,
}

/// Copy every known-risk or high-similarity row into the export database.
/// Each bucket in the export is emptied first, so repeated exports never
/// duplicate rows.
pub fn export_high_risk(
    audit_conn: &Connection,
    export_conn: &Connection,
) -> Result<ExportSummary, DatabaseError> {
    let detected_at = Utc::now().to_rfc3339();
    let mut summary = ExportSummary::default();

    let tx = export_conn.unchecked_transaction()?;
    for (bucket, _) in repository::list_buckets(audit_conn)? {
        let rows = repository::list_high_risk_rows(audit_conn, &bucket)?;
        repository::reset_high_risk_bucket(&tx, &bucket)?;
        for row in &rows {
            repository::insert_high_risk_row(&tx, row, &detected_at)?;
        }
        tracing::debug!(bucket = %bucket, rows = rows.len(), "High-risk rows exported");
        summary.total += rows.len();
        summary.buckets.push((bucket, rows.len()));
    }
    tx.commit()?;

    tracing::info!(total = summary.total, "High-risk export complete");
    Ok(summary)
}
