use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "ddi-audit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output directory used when neither the CLI nor the environment names one.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// Environment variable overriding the output directory.
pub const OUTPUT_DIR_ENV: &str = "DDI_AUDIT_OUTPUT_DIR";

/// Log filter applied when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "ddi_audit_lib=info,ddi_audit=info,warn"
}

/// Log filter for `--verbose` runs.
pub fn verbose_log_filter() -> &'static str {
    "ddi_audit_lib=debug,ddi_audit=debug,warn"
}

/// File layout under one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source patient/prescription database.
    pub fn patients_db(&self) -> PathBuf {
        self.root.join("patients.db")
    }

    /// Per-department audit rows.
    pub fn audit_db(&self) -> PathBuf {
        self.root.join("audit_results.db")
    }

    /// Human-readable pair cache (JSON backend).
    pub fn json_cache(&self) -> PathBuf {
        self.root.join("audit_cache.json")
    }

    /// Embedded pair cache (SQLite backend).
    pub fn sqlite_cache(&self) -> PathBuf {
        self.root.join("audit_cache.db")
    }

    /// High-risk subset produced by `export-high-risk`.
    pub fn high_risk_db(&self) -> PathBuf {
        self.root.join("high_risk_patients.db")
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}
