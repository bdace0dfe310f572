//! Full audit run orchestration.

use std::collections::HashSet;
use std::time::Instant;

use uuid::Uuid;

use super::dedup::plan_pairs;
use super::error::AuditError;
use super::scheduler::AuditScheduler;
use super::sink::bucket_name;
use super::traits::{PatientSource, ResultSink};
use super::types::{AuditStatusEvent, AuditSummary};

/// Generate a run identifier.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Run the full audit:
/// 1. Load polypharmacy patients
/// 2. Plan distinct pairs
/// 3. Fill the pair cache (one lookup per distinct pair)
/// 4. Fan verdicts out to one row per patient pair
/// 5. Write rows into department buckets
///
/// Lookup failures never abort the run; they show up as verdicts. Store
/// failures (patient source, result sink) do.
pub fn run_full_audit(
    source: &dyn PatientSource,
    scheduler: &mut AuditScheduler,
    sink: &mut dyn ResultSink,
    run_id: &str,
    progress_fn: Option<&dyn Fn(AuditStatusEvent)>,
) -> Result<AuditSummary, AuditError> {
    let start = Instant::now();

    let patients = source.list_at_risk_patients()?;
    if patients.is_empty() {
        tracing::info!(run_id, "No polypharmacy patients found, nothing to audit");
        return Ok(AuditSummary::empty(run_id));
    }

    let plan = plan_pairs(&patients);
    tracing::info!(
        run_id,
        patients = patients.len(),
        distinct_pairs = plan.pairs.len(),
        occurrences = plan.occurrence_count(),
        "Audit started"
    );

    if let Some(progress) = progress_fn {
        progress(AuditStatusEvent::Started {
            patient_count: patients.len(),
            pair_count: plan.pairs.len(),
        });
    }

    // Phase 1
    let outcome = scheduler.fill(&plan.pairs, progress_fn);
    if let Err(e) = scheduler.flush_cache() {
        tracing::warn!(error = %e, "Pair cache flush failed; results are still written");
    }

    // Phase 2
    let rows = scheduler.fan_out(&patients, &plan, &outcome.resolved);

    let mut buckets: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for row in &rows {
        let bucket = bucket_name(&row.department);
        if seen.insert(bucket.clone()) {
            sink.ensure_bucket(&bucket, &row.department)?;
            buckets.push(bucket.clone());
        }
        sink.append_row(&bucket, row)?;
    }
    sink.finish()?;

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        run_id,
        rows = rows.len(),
        buckets = buckets.len(),
        duration_ms,
        "Audit complete"
    );

    if let Some(progress) = progress_fn {
        progress(AuditStatusEvent::Completed {
            rows_written: rows.len(),
            duration_ms,
        });
    }

    Ok(AuditSummary {
        run_id: run_id.to_string(),
        patients: patients.len(),
        distinct_pairs: plan.pairs.len(),
        rows_written: rows.len(),
        buckets,
        self_pairs_skipped: plan.self_pairs_skipped,
        blank_pairs_skipped: plan.blank_pairs_skipped,
        repeats_collapsed: plan.repeats_collapsed,
        fill: outcome.report,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository;
    use crate::db::sqlite::{open_memory_database, Schema};
    use crate::models::{AuditRow, ChemistryVerdict, LiteratureVerdict, Patient};
    use crate::pipeline::audit::cache::MemoryPairCache;
    use crate::pipeline::audit::sink::SqliteResultSink;
    use crate::pipeline::audit::traits::{ChemistryScorer, LiteratureScorer};
    use crate::pipeline::audit::types::AuditConfig;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    struct FixedSource(Vec<Patient>);

    impl PatientSource for FixedSource {
        fn list_at_risk_patients(&self) -> Result<Vec<Patient>, AuditError> {
            Ok(self.0.clone())
        }
    }

    struct CountingLiterature(Rc<Cell<usize>>);

    impl LiteratureScorer for CountingLiterature {
        fn score(&self, a: &str, b: &str) -> LiteratureVerdict {
            self.0.set(self.0.get() + 1);
            if (a, b) == ("Aspirin", "Clopidogrel") {
                LiteratureVerdict::KnownRisk {
                    citations: 20,
                    summary: "Bleeding risk.".into(),
                }
            } else {
                LiteratureVerdict::NoFlag
            }
        }
    }

    struct FlatChemistry;

    impl ChemistryScorer for FlatChemistry {
        fn score(&self, _: &str, _: &str) -> ChemistryVerdict {
            ChemistryVerdict::LowSimilarity { score: 0.1 }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        buckets: Vec<(String, String)>,
        rows: Vec<(String, AuditRow)>,
        finished: bool,
    }

    impl ResultSink for RecordingSink {
        fn ensure_bucket(&mut self, bucket: &str, department: &str) -> Result<(), AuditError> {
            self.buckets.push((bucket.into(), department.into()));
            Ok(())
        }
        fn append_row(&mut self, bucket: &str, row: &AuditRow) -> Result<(), AuditError> {
            self.rows.push((bucket.into(), row.clone()));
            Ok(())
        }
        fn finish(&mut self) -> Result<(), AuditError> {
            self.finished = true;
            Ok(())
        }
    }

    fn patient(id: i64, department: &str, meds: &[&str]) -> Patient {
        Patient {
            id,
            name: format!("Patient {id}"),
            age: Some(40 + id),
            department: department.into(),
            diagnosis: Some("Hypertension".into()),
            medications: meds.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn scheduler(calls: Rc<Cell<usize>>) -> AuditScheduler {
        AuditScheduler::new(
            Box::new(MemoryPairCache::new()),
            Box::new(CountingLiterature(calls)),
            Box::new(FlatChemistry),
            AuditConfig {
                politeness_delay: Duration::ZERO,
                ..AuditConfig::default()
            },
        )
    }

    #[test]
    fn empty_source_writes_nothing() {
        let calls = Rc::new(Cell::new(0));
        let mut sched = scheduler(calls.clone());
        let mut sink = RecordingSink::default();
        let summary =
            run_full_audit(&FixedSource(vec![]), &mut sched, &mut sink, "run-0", None).unwrap();

        assert_eq!(summary.rows_written, 0);
        assert_eq!(calls.get(), 0);
        assert!(sink.buckets.is_empty());
        assert!(!sink.finished);
    }

    #[test]
    fn shared_pairs_are_looked_up_once_and_bucketed_by_department() {
        let source = FixedSource(vec![
            patient(1, "Cardiology", &["Clopidogrel", "Aspirin", "Atorvastatin"]),
            patient(2, "General Medicine", &["Aspirin", "Clopidogrel", "Omeprazole"]),
        ]);
        let calls = Rc::new(Cell::new(0));
        let mut sched = scheduler(calls.clone());
        let mut sink = RecordingSink::default();

        let summary = run_full_audit(&source, &mut sched, &mut sink, "run-1", None).unwrap();

        assert_eq!(summary.distinct_pairs, 5);
        assert_eq!(calls.get(), 5);
        assert_eq!(summary.rows_written, 6);
        assert_eq!(summary.buckets, vec!["Cardiology", "General_Medicine"]);
        assert_eq!(sink.buckets[1], ("General_Medicine".into(), "General Medicine".into()));
        assert!(sink.finished);

        let known: Vec<_> = sink
            .rows
            .iter()
            .filter(|(_, r)| r.pair_key == "Aspirin|Clopidogrel")
            .collect();
        assert_eq!(known.len(), 2);
        assert!(known.iter().all(|(_, r)| r.literature.is_high_risk()));
    }

    #[test]
    fn rerun_hits_cache_and_replaces_bucket_rows() {
        let source = FixedSource(vec![patient(1, "Cardiology", &["Clopidogrel", "Aspirin", "Atorvastatin"])]);
        let calls = Rc::new(Cell::new(0));
        let mut sched = scheduler(calls.clone());
        let conn = open_memory_database(Schema::Audit).unwrap();
        let mut sink = SqliteResultSink::new(conn, "run-1");

        run_full_audit(&source, &mut sched, &mut sink, "run-1", None).unwrap();
        let summary = run_full_audit(&source, &mut sched, &mut sink, "run-1", None).unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(summary.fill.cache_hits, 3);
        assert_eq!(repository::count_bucket_rows(sink.connection(), "Cardiology").unwrap(), 3);
    }

    #[test]
    fn progress_events_bracket_the_run() {
        let source = FixedSource(vec![patient(1, "Neurology", &["Valproate", "Carbamazepine", "Levetiracetam"])]);
        let mut sched = scheduler(Rc::new(Cell::new(0)));
        let mut sink = RecordingSink::default();
        let events = RefCell::new(Vec::new());
        let progress = |e: AuditStatusEvent| events.borrow_mut().push(e);

        run_full_audit(&source, &mut sched, &mut sink, "run-2", Some(&progress)).unwrap();

        let events = events.into_inner();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[0],
            AuditStatusEvent::Started {
                patient_count: 1,
                pair_count: 3
            }
        );
        assert!(matches!(events[4], AuditStatusEvent::Completed { rows_written: 3, .. }));
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
