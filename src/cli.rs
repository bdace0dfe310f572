//! Command-line interface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::config::{OutputPaths, DEFAULT_OUTPUT_DIR, OUTPUT_DIR_ENV};
use crate::db::sqlite::{open_database, Schema};
use crate::db::{repository, DatabaseError};
use crate::pipeline::audit::{
    new_run_id, run_full_audit, AuditConfig, AuditError, AuditScheduler, AuditStatusEvent,
    JsonFileCache, MemoryPairCache, PairCache, SqlitePairCache, SqlitePatientSource,
    SqliteResultSink,
};
use crate::reporting;
use crate::scoring::pubmed::DEFAULT_ESEARCH_URL;
use crate::scoring::{PubMedClient, StructureSimilarityScorer, StructureTable};
use crate::seed::{self, Catalog, SeedConfig, SeedError};

#[derive(Parser, Debug)]
#[command(name = "ddi-audit")]
#[command(version)]
#[command(about = "Audit polypharmacy patients for risky drug-drug combinations", long_about = None)]
pub struct Cli {
    /// Directory holding the patient, audit and cache files
    #[arg(long, global = true, env = OUTPUT_DIR_ENV, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic patient database
    Seed {
        /// Number of patients
        #[arg(long, default_value_t = 100)]
        patients: usize,

        /// How many of them take three or more drugs
        #[arg(long, default_value_t = 55)]
        polypharmacy: usize,

        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Audit every polypharmacy patient and store per-department results
    Audit(AuditArgs),

    /// Print summary metrics for the stored audit results
    Report {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Copy known-risk and high-similarity rows into a separate database
    ExportHighRisk,

    /// Delete every cached pair verdict
    ClearCache {
        #[arg(long, value_enum, default_value_t = CacheBackend::Json)]
        cache_backend: CacheBackend,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    /// Human-readable JSON file
    Json,
    /// Embedded SQLite table
    Sqlite,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[arg(long, value_enum, default_value_t = CacheBackend::Json)]
    pub cache_backend: CacheBackend,

    /// Minimum spacing between literature requests, in milliseconds (at least 500)
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(500..))]
    pub delay_ms: u64,

    /// Re-query literature verdicts older than this many days (0 = never)
    #[arg(long, default_value_t = 30)]
    pub literature_ttl_days: u32,

    /// Literature search endpoint
    #[arg(long, env = "DDI_AUDIT_PUBMED_URL", default_value = DEFAULT_ESEARCH_URL)]
    pub pubmed_url: String,

    /// NCBI API key (raises the request rate limit)
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Literature request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Prescriptions needed to count as polypharmacy
    #[arg(long, default_value_t = 3)]
    pub min_prescriptions: u32,

    /// Persist the JSON cache after this many new entries (0 = at the end)
    #[arg(long, default_value_t = 1)]
    pub autosave_every: usize,

    /// Match biological agent keywords regardless of case
    #[arg(long)]
    pub case_insensitive_biologics: bool,

    /// Structure table (JSON map of drug name to SMILES) replacing the bundled one
    #[arg(long, value_name = "FILE")]
    pub structures: Option<PathBuf>,
}

impl AuditArgs {
    pub fn audit_config(&self) -> AuditConfig {
        AuditConfig {
            politeness_delay: Duration::from_millis(self.delay_ms),
            literature_ttl: (self.literature_ttl_days > 0)
                .then(|| chrono::Duration::days(i64::from(self.literature_ttl_days))),
            min_prescriptions: self.min_prescriptions,
            case_sensitive_biologics: !self.case_insensitive_biologics,
            ..AuditConfig::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path} not found; {hint}")]
    MissingInput { path: PathBuf, hint: &'static str },
}

/// Run one parsed command.
pub fn execute(cli: Cli) -> Result<(), CliError> {
    let paths = OutputPaths::new(cli.output_dir);
    match cli.command {
        Command::Seed {
            patients,
            polypharmacy,
            seed,
        } => run_seed(
            &paths,
            SeedConfig {
                patients,
                polypharmacy,
                seed,
            },
        ),
        Command::Audit(args) => run_audit(&paths, &args),
        Command::Report { json } => run_report(&paths, json),
        Command::ExportHighRisk => run_export(&paths),
        Command::ClearCache { cache_backend } => run_clear_cache(&paths, cache_backend),
    }
}

fn require(path: &Path, hint: &'static str) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::MissingInput {
            path: path.to_path_buf(),
            hint,
        })
    }
}

fn run_seed(paths: &OutputPaths, config: SeedConfig) -> Result<(), CliError> {
    paths.ensure_root()?;
    let conn = open_database(&paths.patients_db(), Schema::Patients)?;
    let report = seed::seed_database(&conn, &Catalog::bundled()?, &config)?;
    println!(
        "Created {} patients ({} polypharmacy, {} prescriptions) in {}",
        report.patients,
        report.polypharmacy,
        report.prescriptions,
        paths.patients_db().display()
    );
    Ok(())
}

fn open_cache(paths: &OutputPaths, args: &AuditArgs) -> Box<dyn PairCache> {
    match args.cache_backend {
        CacheBackend::Json => Box::new(JsonFileCache::open(paths.json_cache(), args.autosave_every)),
        CacheBackend::Sqlite => match SqlitePairCache::open(&paths.sqlite_cache()) {
            Ok(cache) => Box::new(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Pair cache unavailable, continuing without persistence");
                Box::new(MemoryPairCache::new())
            }
        },
    }
}

fn run_audit(paths: &OutputPaths, args: &AuditArgs) -> Result<(), CliError> {
    require(&paths.patients_db(), "run `ddi-audit seed` first")?;
    paths.ensure_root()?;

    let config = args.audit_config();
    let source = SqlitePatientSource::open(&paths.patients_db(), config.min_prescriptions)?;

    let table = match &args.structures {
        Some(path) => StructureTable::load(path).map_err(AuditError::from)?,
        None => StructureTable::bundled().map_err(AuditError::from)?,
    };
    let literature = PubMedClient::new(&args.pubmed_url, args.timeout_secs, args.api_key.clone())
        .map_err(AuditError::from)?;

    let mut scheduler = AuditScheduler::new(
        open_cache(paths, args),
        Box::new(literature),
        Box::new(StructureSimilarityScorer::new(table)),
        config,
    );

    let run_id = new_run_id();
    let mut sink = SqliteResultSink::open(&paths.audit_db(), &run_id)?;

    let progress = |event: AuditStatusEvent| match event {
        AuditStatusEvent::Started {
            patient_count,
            pair_count,
        } => tracing::info!(patient_count, pair_count, "Evaluating distinct pairs"),
        AuditStatusEvent::PairEvaluated {
            completed,
            total,
            pair_key,
            cache_hit,
        } => tracing::info!("[{completed}/{total}] {pair_key}{}", if cache_hit { " (cached)" } else { "" }),
        AuditStatusEvent::Completed { .. } => {}
    };

    let summary = run_full_audit(&source, &mut scheduler, &mut sink, &run_id, Some(&progress))?;

    println!("Audit {} complete", summary.run_id);
    println!("  Patients audited:     {}", summary.patients);
    println!("  Distinct pairs:       {}", summary.distinct_pairs);
    println!("  Rows written:         {}", summary.rows_written);
    println!("  Served from cache:    {}", summary.fill.cache_hits);
    println!("  Lookup failures:      {}", summary.fill.transient_failures);
    if summary.repeats_collapsed > 0 || summary.self_pairs_skipped > 0 {
        println!(
            "  Repeated drugs:       {} self-pairs skipped, {} repeat pairs collapsed",
            summary.self_pairs_skipped, summary.repeats_collapsed
        );
    }
    if summary.blank_pairs_skipped > 0 {
        println!("  Blank drug names:     {} pairs skipped", summary.blank_pairs_skipped);
    }
    println!("Results saved to {}", paths.audit_db().display());
    Ok(())
}

fn run_report(paths: &OutputPaths, json: bool) -> Result<(), CliError> {
    require(&paths.audit_db(), "run `ddi-audit audit` first")?;
    let conn = open_database(&paths.audit_db(), Schema::Audit)?;
    let report = reporting::build_report(&conn)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", reporting::render_report(&report));
    }
    Ok(())
}

fn run_export(paths: &OutputPaths) -> Result<(), CliError> {
    require(&paths.audit_db(), "run `ddi-audit audit` first")?;
    let audit = open_database(&paths.audit_db(), Schema::Audit)?;
    let export = open_database(&paths.high_risk_db(), Schema::HighRisk)?;
    let summary = reporting::export_high_risk(&audit, &export)?;

    if summary.total == 0 {
        println!("No high-risk interactions found in any department.");
    } else {
        for (bucket, count) in &summary.buckets {
            println!("  {bucket:<20} {count}");
        }
        println!(
            "Exported {} high-risk interactions to {}",
            summary.total,
            paths.high_risk_db().display()
        );
    }
    Ok(())
}

fn run_clear_cache(paths: &OutputPaths, backend: CacheBackend) -> Result<(), CliError> {
    match backend {
        CacheBackend::Json => {
            let path = paths.json_cache();
            match std::fs::remove_file(&path) {
                Ok(()) => println!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => println!("No cache at {}", path.display()),
                Err(e) => return Err(e.into()),
            }
        }
        CacheBackend::Sqlite => {
            let path = paths.sqlite_cache();
            if !path.exists() {
                println!("No cache at {}", path.display());
                return Ok(());
            }
            let conn = open_database(&path, Schema::PairCache)?;
            let removed = repository::clear_pair_cache(&conn)?;
            println!("Removed {removed} cached pairs from {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn audit_defaults() {
        let cli = Cli::try_parse_from(["ddi-audit", "audit"]).unwrap();
        let Command::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.cache_backend, CacheBackend::Json);
        let config = args.audit_config();
        assert_eq!(config.politeness_delay, Duration::from_millis(500));
        assert_eq!(config.literature_ttl, Some(chrono::Duration::days(30)));
        assert_eq!(config.min_prescriptions, 3);
        assert!(config.case_sensitive_biologics);
    }

    #[test]
    fn audit_overrides() {
        let cli = Cli::try_parse_from([
            "ddi-audit",
            "--output-dir",
            "/tmp/ddi",
            "audit",
            "--cache-backend",
            "sqlite",
            "--delay-ms",
            "750",
            "--literature-ttl-days",
            "0",
            "--case-insensitive-biologics",
        ])
        .unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/ddi"));
        let Command::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.cache_backend, CacheBackend::Sqlite);
        let config = args.audit_config();
        assert_eq!(config.politeness_delay, Duration::from_millis(750));
        assert_eq!(config.literature_ttl, None);
        assert!(!config.case_sensitive_biologics);
    }

    #[test]
    fn rejects_delay_below_rate_limit() {
        assert!(Cli::try_parse_from(["ddi-audit", "audit", "--delay-ms", "100"]).is_err());
    }

    #[test]
    fn seed_then_report_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["ddi-audit", "--output-dir", out, "seed", "--patients", "12"]).unwrap();
        execute(cli).unwrap();
        assert!(dir.path().join("patients.db").exists());

        let cli = Cli::try_parse_from(["ddi-audit", "--output-dir", out, "report"]).unwrap();
        assert!(matches!(execute(cli), Err(CliError::MissingInput { .. })));
    }

    #[test]
    fn clear_cache_without_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        for backend in ["json", "sqlite"] {
            let cli = Cli::try_parse_from(["ddi-audit", "--output-dir", out, "clear-cache", "--cache-backend", backend])
                .unwrap();
            execute(cli).unwrap();
        }
    }
}
