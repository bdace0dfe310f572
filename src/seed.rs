//! Synthetic patient database for demos and tests.
//!
//! Patients are spread across departments with department-appropriate
//! ages, diagnoses and medications. The first `polypharmacy` patients get
//! three to six drugs, the rest one or two. Output is deterministic for a
//! given seed.

use std::collections::{BTreeSet, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;

use crate::db::repository::{self, NewPatient};
use crate::db::DatabaseError;

const BUNDLED_CATALOG: &str = include_str!("../resources/departments.json");

/// Attempts to draw extra comorbidity drugs before giving up on a target.
const MAX_FILL_ATTEMPTS: usize = 20;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Catalog is invalid: {0}")]
    Catalog(String),

    #[error("Requested {requested} patients but only {available} unique names exist")]
    TooManyPatients { requested: usize, available: usize },
}

impl From<rusqlite::Error> for SeedError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Department {
    pub name: String,
    /// Pediatric patients are 1–17; everyone else 18–90.
    #[serde(default)]
    pub pediatric: bool,
    pub diagnoses: Vec<String>,
    pub medications: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub departments: Vec<Department>,
}

impl Catalog {
    pub fn bundled() -> Result<Self, SeedError> {
        let catalog: Catalog =
            serde_json::from_str(BUNDLED_CATALOG).map_err(|e| SeedError::Catalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), SeedError> {
        if self.first_names.is_empty() || self.last_names.is_empty() {
            return Err(SeedError::Catalog("name lists are empty".into()));
        }
        if self.departments.is_empty() {
            return Err(SeedError::Catalog("no departments".into()));
        }
        for dept in &self.departments {
            if dept.diagnoses.is_empty() || dept.medications.is_empty() {
                return Err(SeedError::Catalog(format!(
                    "department {} has no diagnoses or medications",
                    dept.name
                )));
            }
        }
        Ok(())
    }

    pub fn unique_names(&self) -> usize {
        self.first_names.len() * self.last_names.len()
    }

    /// Distinct medications of every non-pediatric department, sorted.
    pub fn comorbidity_pool(&self) -> Vec<&str> {
        self.departments
            .iter()
            .filter(|d| !d.pediatric)
            .flat_map(|d| d.medications.iter().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedConfig {
    pub patients: usize,
    pub polypharmacy: usize,
    pub seed: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            patients: 100,
            polypharmacy: 55,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub patients: usize,
    pub polypharmacy: usize,
    pub prescriptions: usize,
}

/// Replace every patient in `conn` with a freshly generated population.
pub fn seed_database(
    conn: &Connection,
    catalog: &Catalog,
    config: &SeedConfig,
) -> Result<SeedReport, SeedError> {
    if config.patients > catalog.unique_names() {
        return Err(SeedError::TooManyPatients {
            requested: config.patients,
            available: catalog.unique_names(),
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let pool = catalog.comorbidity_pool();
    let mut used_names = HashSet::new();
    let mut report = SeedReport::default();

    let tx = conn.unchecked_transaction()?;
    repository::clear_patients(&tx)?;

    for index in 0..config.patients {
        let name = loop {
            let first = catalog.first_names.choose(&mut rng).map(String::as_str).unwrap_or_default();
            let last = catalog.last_names.choose(&mut rng).map(String::as_str).unwrap_or_default();
            let candidate = format!("{first} {last}");
            if used_names.insert(candidate.clone()) {
                break candidate;
            }
        };

        let Some(dept) = catalog.departments.choose(&mut rng) else {
            return Err(SeedError::Catalog("no departments".into()));
        };
        let age = if dept.pediatric {
            rng.gen_range(1..=17)
        } else {
            rng.gen_range(18..=90)
        };
        let diagnosis = dept.diagnoses.choose(&mut rng).cloned();

        let patient_id = repository::insert_patient(
            &tx,
            &NewPatient {
                name,
                age: Some(age),
                department: dept.name.clone(),
                diagnosis,
            },
        )?;

        let target = if index < config.polypharmacy {
            report.polypharmacy += 1;
            rng.gen_range(3..=6)
        } else {
            rng.gen_range(1..=2)
        };

        let primary = dept.medications.len().min(rng.gen_range(1..=2));
        let mut meds: Vec<&str> = dept
            .medications
            .choose_multiple(&mut rng, primary)
            .map(String::as_str)
            .collect();

        let mut attempts = 0;
        while meds.len() < target && attempts < MAX_FILL_ATTEMPTS {
            attempts += 1;
            if let Some(&drug) = pool.choose(&mut rng) {
                if !meds.contains(&drug) {
                    meds.push(drug);
                }
            }
        }

        for drug in &meds {
            repository::insert_prescription(&tx, patient_id, drug)?;
        }
        report.prescriptions += meds.len();
        report.patients += 1;
    }

    tx.commit()?;
    tracing::info!(
        patients = report.patients,
        polypharmacy = report.polypharmacy,
        prescriptions = report.prescriptions,
        seed = config.seed,
        "Patient database seeded"
    );
    Ok(report)
}
