//! Short clinical summaries for pairs with a documented interaction.

struct SummaryRule {
    /// One drug must come from each group. An empty second group matches
    /// any partner.
    first: &'static [&'static str],
    second: &'static [&'static str],
    summary: &'static str,
}

const RULES: &[SummaryRule] = &[
    SummaryRule {
        first: &["amlodipine", "losartan", "lisinopril"],
        second: &["furosemide", "spironolactone"],
        summary: "Potential for severe hypotension and electrolyte imbalance (potassium fluctuation).",
    },
    SummaryRule {
        first: &["aspirin", "clopidogrel"],
        second: &["ibuprofen", "meloxicam", "diclofenac", "naproxen"],
        summary: "High risk of gastrointestinal bleeding; concurrent use diminishes antiplatelet efficacy of Aspirin.",
    },
    SummaryRule {
        first: &["insulin", "glipizide", "metformin"],
        second: &["carvedilol"],
        summary: "Beta-blocker masks symptoms of hypoglycemia (tachycardia); blood glucose monitoring required.",
    },
    SummaryRule {
        first: &["omeprazole", "pantoprazole"],
        second: &["clopidogrel"],
        summary: "PPI inhibits CYP2C19, significantly reducing the cardiovascular efficacy of Clopidogrel.",
    },
    SummaryRule {
        first: &["valproate", "carbamazepine"],
        second: &[],
        summary: "Hepatic enzyme induction/inhibition affecting metabolism; requires dose titration and LFT monitoring.",
    },
];

const FALLBACK: &str =
    "Increased risk of adverse pharmacological synergy. Monitor patient for combined side-effect profile.";

/// Summary for a pair with many citations. Rules are checked in order,
/// names compared case-insensitively, either argument order.
pub fn interaction_summary(drug_a: &str, drug_b: &str) -> &'static str {
    let a = drug_a.to_lowercase();
    let b = drug_b.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.matches(&a, &b) || rule.matches(&b, &a))
        .map(|rule| rule.summary)
        .unwrap_or(FALLBACK)
}

impl SummaryRule {
    fn matches(&self, x: &str, y: &str) -> bool {
        self.first.iter().any(|d| *d == x)
            && (self.second.is_empty() || self.second.iter().any(|d| *d == y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_in_either_order_and_case() {
        let s = interaction_summary("IBUPROFEN", "aspirin");
        assert!(s.starts_with("High risk of gastrointestinal bleeding"));
        assert_eq!(s, interaction_summary("Aspirin", "Ibuprofen"));
    }

    #[test]
    fn first_matching_rule_wins() {
        // Clopidogrel + Naproxen hits the antiplatelet rule before the PPI rule.
        assert!(interaction_summary("Clopidogrel", "Naproxen").contains("bleeding"));
        assert!(interaction_summary("Clopidogrel", "Pantoprazole").contains("CYP2C19"));
    }

    #[test]
    fn anticonvulsant_rule_matches_any_partner() {
        assert!(interaction_summary("Levodopa", "Valproate").contains("Hepatic enzyme"));
    }

    #[test]
    fn unknown_pair_uses_fallback() {
        assert_eq!(interaction_summary("Cetirizine", "Loperamide"), FALLBACK);
    }
}
