use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use serde_json::{Map, Value};

use super::is_present;

const SIMILARITY_CHECKS: u8 = 4;

/// Names present on one side, the other, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameDiff {
    pub only_a: BTreeSet<String>,
    pub only_b: BTreeSet<String>,
    pub common: BTreeSet<String>,
}

impl NameDiff {
    fn between(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Self {
        Self {
            only_a: a.difference(b).cloned().collect(),
            only_b: b.difference(a).cloned().collect(),
            common: a.intersection(b).cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.only_a.is_empty() && self.only_b.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDays {
    pub prior: i64,
    pub post: i64,
}

/// Structural comparison of two cohort expressions. Says nothing about
/// whether the two select the same patients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortComparison {
    pub name_a: String,
    pub name_b: String,
    pub concept_sets: (usize, usize),
    pub concept_set_names: NameDiff,
    pub inclusion_rules: (usize, usize),
    pub rule_names: NameDiff,
    pub primary_criteria: (bool, bool),
    /// Set only when both sides define primary criteria with differing windows.
    pub window_difference: Option<(WindowDays, WindowDays)>,
    pub score: u8,
}

impl CohortComparison {
    #[must_use]
    pub fn new(name_a: &str, a: &Value, name_b: &str, b: &Value) -> Self {
        let sets_a = items(a, "ConceptSets");
        let sets_b = items(b, "ConceptSets");
        let rules_a = items(a, "InclusionRules");
        let rules_b = items(b, "InclusionRules");

        let concept_set_names = NameDiff::between(
            &names(sets_a, "Unnamed"),
            &names(sets_b, "Unnamed"),
        );
        let rule_names = NameDiff::between(&names(rules_a, "Rule"), &names(rules_b, "Rule"));

        let primary_a = a.get("PrimaryCriteria");
        let primary_b = b.get("PrimaryCriteria");
        let primary_criteria = (is_present(primary_a), is_present(primary_b));

        let window_difference = match (primary_a, primary_b) {
            (Some(pa), Some(pb)) if primary_criteria.0 && primary_criteria.1 => {
                let wa = observation_window(pa);
                let wb = observation_window(pb);
                (wa != wb).then(|| (window_days(&wa), window_days(&wb)))
            }
            _ => None,
        };

        let mut score = 0;
        if sets_a.len() == sets_b.len() {
            score += 1;
        }
        if rules_a.len() == rules_b.len() {
            score += 1;
        }
        if primary_criteria.0 == primary_criteria.1 {
            score += 1;
        }
        if !concept_set_names.common.is_empty() || (sets_a.is_empty() && sets_b.is_empty()) {
            score += 1;
        }

        Self {
            name_a: name_a.to_string(),
            name_b: name_b.to_string(),
            concept_sets: (sets_a.len(), sets_b.len()),
            concept_set_names,
            inclusion_rules: (rules_a.len(), rules_b.len()),
            rule_names,
            primary_criteria,
            window_difference,
            score,
        }
    }

    /// Similarity as a whole percentage of the structural checks passed.
    #[must_use]
    pub fn similarity_percent(&self) -> u8 {
        self.score * (100 / SIMILARITY_CHECKS)
    }

    #[must_use]
    pub fn verdict(&self) -> &'static str {
        match self.similarity_percent() {
            81.. => "✅ Cohorts are very similar",
            61..=80 => "⚠️  Cohorts have some differences",
            _ => "❌ Cohorts are quite different",
        }
    }
}

impl fmt::Display for CohortComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = (&self.name_a, &self.name_b);
        let mut text = format!("Cohort Comparison: {a} vs {b}\n\n");

        text.push_str("Concept Sets:\n");
        let _ = writeln!(text, "  {a}: {} sets", self.concept_sets.0);
        let _ = writeln!(text, "  {b}: {} sets\n", self.concept_sets.1);
        write_diff(&mut text, &self.concept_set_names, a, b, "Concept sets only in", "Common concept sets");
        text.push('\n');

        text.push_str("Inclusion Rules:\n");
        let _ = writeln!(text, "  {a}: {} rules", self.inclusion_rules.0);
        let _ = writeln!(text, "  {b}: {} rules\n", self.inclusion_rules.1);
        write_diff(&mut text, &self.rule_names, a, b, "Rules only in", "Common rules");
        text.push('\n');

        text.push_str("Primary Criteria:\n");
        let _ = writeln!(text, "  {a}: {}", defined(self.primary_criteria.0));
        let _ = writeln!(text, "  {b}: {}", defined(self.primary_criteria.1));
        if let Some((wa, wb)) = self.window_difference {
            text.push_str("\nObservation Window Differences:\n");
            let _ = writeln!(text, "  {a}: {} prior, {} post days", wa.prior, wa.post);
            let _ = writeln!(text, "  {b}: {} prior, {} post days", wb.prior, wb.post);
        }

        text.push_str("\n📊 Similarity Assessment:\n");
        let _ = writeln!(text, "Structural similarity: {}%", self.similarity_percent());
        text.push_str(self.verdict());

        f.write_str(&text)
    }
}

fn write_diff(text: &mut String, diff: &NameDiff, a: &str, b: &str, only: &str, common: &str) {
    if !diff.only_a.is_empty() {
        let _ = writeln!(text, "{only} {a}: {}", join(&diff.only_a));
    }
    if !diff.only_b.is_empty() {
        let _ = writeln!(text, "{only} {b}: {}", join(&diff.only_b));
    }
    if !diff.common.is_empty() {
        let _ = writeln!(text, "{common}: {}", join(&diff.common));
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

const fn defined(present: bool) -> &'static str {
    if present { "Defined" } else { "Not defined" }
}

fn items<'a>(expression: &'a Value, key: &str) -> &'a [Value] {
    expression
        .get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn names(items: &[Value], fallback: &str) -> BTreeSet<String> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.get("name")
                .and_then(Value::as_str)
                .map_or_else(|| format!("{fallback}_{index}"), str::to_string)
        })
        .collect()
}

fn observation_window(primary: &Value) -> Map<String, Value> {
    primary
        .get("ObservationWindow")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn window_days(window: &Map<String, Value>) -> WindowDays {
    let days = |key: &str| window.get(key).and_then(Value::as_i64).unwrap_or(0);
    WindowDays {
        prior: days("PriorDays"),
        post: days("PostDays"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cohort(sets: &[&str], rules: &[&str], prior: u32) -> Value {
        json!({
            "ConceptSets": sets.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
            "PrimaryCriteria": {
                "CriteriaList": [{"ConditionOccurrence": {"CodesetId": 0}}],
                "ObservationWindow": {"PriorDays": prior, "PostDays": 0}
            },
            "InclusionRules": rules.iter().map(|name| json!({"name": name})).collect::<Vec<_>>()
        })
    }

    #[test]
    fn self_comparison_is_fully_similar() {
        let a = cohort(&["T2DM"], &["adult"], 365);
        let comparison = CohortComparison::new("A", &a, "B", &a);

        assert!(comparison.concept_set_names.is_symmetric());
        assert!(comparison.rule_names.is_symmetric());
        assert_eq!(comparison.window_difference, None);
        assert_eq!(comparison.similarity_percent(), 100);
        assert!(comparison.to_string().ends_with("Structural similarity: 100%\n✅ Cohorts are very similar"));
    }

    #[test]
    fn empty_cohorts_are_fully_similar() {
        let empty = json!({});
        let comparison = CohortComparison::new("A", &empty, "B", &empty);
        assert_eq!(comparison.similarity_percent(), 100);
        assert!(comparison.to_string().contains("  A: Not defined\n"));
    }

    #[test]
    fn differences_are_listed_per_side() {
        let a = cohort(&["T2DM", "Metformin"], &["adult"], 365);
        let b = cohort(&["T2DM"], &["adult", "no insulin"], 180);
        let comparison = CohortComparison::new("Base", &a, "Variant", &b);
        let text = comparison.to_string();

        assert!(text.starts_with("Cohort Comparison: Base vs Variant\n\nConcept Sets:\n  Base: 2 sets\n  Variant: 1 sets\n\n"));
        assert!(text.contains("Concept sets only in Base: Metformin\n"));
        assert!(text.contains("Common concept sets: T2DM\n"));
        assert!(text.contains("Rules only in Variant: no insulin\n"));
        assert!(text.contains(
            "\nObservation Window Differences:\n  Base: 365 prior, 0 post days\n  Variant: 180 prior, 0 post days\n"
        ));
        // Sizes differ on both lists; presence parity and name overlap hold.
        assert_eq!(comparison.similarity_percent(), 50);
        assert!(text.ends_with("❌ Cohorts are quite different"));
    }

    #[test]
    fn unnamed_entries_fall_back_to_positional_names() {
        let a = json!({"ConceptSets": [{}, {"name": "x"}], "InclusionRules": [{}]});
        let b = json!({"ConceptSets": [{}], "InclusionRules": []});
        let comparison = CohortComparison::new("A", &a, "B", &b);

        assert_eq!(comparison.concept_set_names.common.iter().collect::<Vec<_>>(), vec!["Unnamed_0"]);
        assert_eq!(comparison.rule_names.only_a.iter().collect::<Vec<_>>(), vec!["Rule_0"]);
        assert_eq!(comparison.similarity_percent(), 50);
        assert!(comparison.to_string().ends_with("❌ Cohorts are quite different"));
    }

    #[test]
    fn three_checks_is_some_differences() {
        let a = cohort(&["T2DM"], &["adult"], 0);
        let b = cohort(&["T2DM"], &[], 0);
        let comparison = CohortComparison::new("A", &a, "B", &b);
        assert_eq!(comparison.similarity_percent(), 75);
        assert_eq!(comparison.verdict(), "⚠️  Cohorts have some differences");
    }
}
