use serde_json::{Map, Value};

/// Keys touched by a top-level overlay, in caller order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    pub applied: Vec<String>,
    pub ignored: Vec<String>,
}

impl Overlay {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.ignored.is_empty()
    }
}

/// Replaces top-level keys of `target` that already exist.
///
/// Values are swapped wholesale; nested objects are never merged. Keys absent
/// from `target` are left out and reported as ignored.
pub fn apply_modifications(target: &mut Map<String, Value>, modifications: &Map<String, Value>) -> Overlay {
    let mut overlay = Overlay::default();
    for (key, value) in modifications {
        match target.get_mut(key) {
            Some(slot) => {
                *slot = value.clone();
                overlay.applied.push(key.clone());
            }
            None => overlay.ignored.push(key.clone()),
        }
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn existing_keys_are_replaced_wholesale() {
        let mut target = object(json!({
            "PrimaryCriteria": {"CriteriaList": [1], "ObservationWindow": {"PriorDays": 0}},
            "InclusionRules": []
        }));
        let overlay = apply_modifications(
            &mut target,
            &object(json!({"PrimaryCriteria": {"ObservationWindow": {"PriorDays": 365}}, "Title": "x"})),
        );

        assert_eq!(overlay.applied, vec!["PrimaryCriteria".to_string()]);
        assert_eq!(overlay.ignored, vec!["Title".to_string()]);
        assert_eq!(
            target.get("PrimaryCriteria"),
            Some(&json!({"ObservationWindow": {"PriorDays": 365}}))
        );
        assert!(!target.contains_key("Title"));
    }

    #[test]
    fn empty_overlay_leaves_target_untouched() {
        let original = object(json!({"ConceptSets": [{"name": "a"}]}));
        let mut target = original.clone();
        let overlay = apply_modifications(&mut target, &Map::new());
        assert!(overlay.is_empty());
        assert_eq!(target, original);
    }
}
