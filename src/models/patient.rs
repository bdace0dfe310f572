use serde::{Deserialize, Serialize};

/// A polypharmacy patient as read from the source database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub department: String,
    pub diagnosis: Option<String>,
    /// Medication names in prescription order, as dispensed.
    pub medications: Vec<String>,
}

impl Patient {
    /// Comma-separated medication list stored alongside each audit row.
    pub fn medication_list(&self) -> String {
        self.medications.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_list_keeps_order() {
        let patient = Patient {
            id: 1,
            name: "Aarav Patel".into(),
            age: Some(64),
            department: "Cardiology".into(),
            diagnosis: Some("Angina".into()),
            medications: vec!["Clopidogrel".into(), "Aspirin".into(), "Ibuprofen".into()],
        };
        assert_eq!(patient.medication_list(), "Clopidogrel, Aspirin, Ibuprofen");
    }
}
