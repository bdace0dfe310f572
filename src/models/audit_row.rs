use serde::{Deserialize, Serialize};

use super::verdict::{ChemistryVerdict, LiteratureVerdict};

/// One audited (patient, drug pair) combination.
///
/// `drug_1`/`drug_2` keep the order the drugs appear in the patient's list;
/// `pair_key` is the canonical key shared with every other patient taking
/// the same two drugs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub patient_id: i64,
    pub patient_name: String,
    pub age: Option<i64>,
    pub department: String,
    pub diagnosis: Option<String>,
    pub medication_list: String,
    pub drug_1: String,
    pub drug_2: String,
    pub pair_key: String,
    pub literature: LiteratureVerdict,
    pub chemistry: ChemistryVerdict,
}

impl AuditRow {
    /// Known literature risk or high structural similarity.
    pub fn is_high_risk(&self) -> bool {
        self.literature.is_high_risk() || self.chemistry.is_high_risk()
    }
}
