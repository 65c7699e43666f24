use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use webapi_models::models::{CohortDefinition, CohortDefinitionDraft, display_timestamp};

use crate::client::WebApi;
use crate::cohort::{CohortComparison, apply_modifications, primary_criteria_label, section_len};
use crate::text::ToolText;

use super::vocabulary::default_limit;
use super::{ControlError, WebApiControlPlane, failure, non_blank};

const AMBIGUOUS_PREVIEW: usize = 10;
const SUMMARY_PREVIEW: usize = 5;
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCohortRequest {
    pub name: String,
    pub cohort_definition: Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadCohortRequest {
    #[serde(default)]
    pub cohort_id: Option<i64>,
    #[serde(default)]
    pub cohort_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCohortsRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub search_term: Option<String>,
}

impl Default for ListCohortsRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            search_term: None,
        }
    }
}

fn default_cohort_a_name() -> String {
    "Cohort A".to_string()
}

fn default_cohort_b_name() -> String {
    "Cohort B".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareCohortsRequest {
    pub cohort_a: Value,
    pub cohort_b: Value,
    #[serde(default = "default_cohort_a_name")]
    pub cohort_a_name: String,
    #[serde(default = "default_cohort_b_name")]
    pub cohort_b_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneCohortRequest {
    pub source_cohort_id: i64,
    pub new_name: String,
    #[serde(default)]
    pub modifications: Option<Map<String, Value>>,
    #[serde(default)]
    pub new_description: Option<String>,
}

/// Structural comparison of two expressions.
#[must_use]
pub fn compare_cohorts(request: &CompareCohortsRequest) -> ToolText {
    ToolText::single(
        CohortComparison::new(
            &request.cohort_a_name,
            &request.cohort_a,
            &request.cohort_b_name,
            &request.cohort_b,
        )
        .to_string(),
    )
}

fn definition_summary(expression: &Value) -> String {
    format!(
        "- Concept Sets: {}\n- Inclusion Rules: {}\n- Primary Criteria: {}\n",
        section_len(expression, "ConceptSets"),
        section_len(expression, "InclusionRules"),
        primary_criteria_label(expression)
    )
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Saves an expression as a new cohort definition.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn save_cohort_definition(&self, request: SaveCohortRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let description = non_blank(request.description.as_deref()).map_or_else(
            || format!("Cohort created via MCP: {}", request.name),
            str::to_string,
        );
        let draft = CohortDefinitionDraft::simple(
            request.name.clone(),
            description,
            request.cohort_definition.clone(),
        );
        let saved = match api.client().create_cohort_definition(&draft).await {
            Ok(saved) => saved,
            Err(err) => return Ok(failure("saving cohort definition", &err)),
        };

        let text = format!(
            "✅ Cohort Definition Saved Successfully!\n\n\
             Cohort ID: {id}\nName: {name}\nDescription: {description}\nCreated: {created}\n\n\
             WebAPI URL: {url}\n\n\
             You can now:\n\
             1. Generate this cohort on your CDM data sources\n\
             2. View and edit it in the ATLAS interface\n\
             3. Use it as input for other analyses\n\n\
             Cohort Definition Summary:\n{summary}",
            id = saved.id,
            name = saved.name,
            description = saved.description.as_deref().unwrap_or(&draft.description),
            created = display_timestamp(saved.created_date.as_ref()),
            url = api.cohort_url(saved.id),
            summary = definition_summary(&request.cohort_definition),
        );
        Ok(ToolText::single(text))
    }

    /// Loads a cohort by id, or by name with exact-then-substring matching.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidInput` when neither id nor name is given,
    /// or `ControlError::MissingSetting` when no base URL is configured.
    pub async fn load_existing_cohort(&self, request: LoadCohortRequest) -> Result<ToolText, ControlError> {
        let name = non_blank(request.cohort_name.as_deref());
        let lookup = match (request.cohort_id, name) {
            (Some(cohort_id), _) => Ok(cohort_id),
            (None, Some(name)) => Err(name),
            (None, None) => {
                return Err(ControlError::InvalidInput(
                    "Either cohort_id or cohort_name must be provided".to_string(),
                ));
            }
        };
        let api = self.connector.connect()?;

        let cohort_id = match lookup {
            Ok(cohort_id) => cohort_id,
            Err(name) => {
                let cohorts = match api.client().list_cohort_definitions().await {
                    Ok(cohorts) => cohorts,
                    Err(err) => return Ok(failure("loading cohort", &err)),
                };
                match match_by_name(&cohorts, name) {
                    NameMatch::None => {
                        return Ok(ToolText::single(format!(
                            "No cohort found with name containing: '{name}'"
                        )));
                    }
                    NameMatch::Ambiguous(matches) => {
                        let mut text = format!("Multiple cohorts found matching '{name}':\n\n");
                        for cohort in matches.iter().take(AMBIGUOUS_PREVIEW) {
                            let _ = writeln!(text, "  - ID {}: {}", cohort.id, cohort.name);
                        }
                        text.push_str("\nPlease specify a cohort_id or use a more specific name.");
                        return Ok(ToolText::single(text));
                    }
                    NameMatch::Single(cohort) => cohort.id,
                }
            }
        };

        let cohort = match api.client().get_cohort_definition(cohort_id).await {
            Ok(Some(cohort)) => cohort,
            Ok(None) => return Ok(ToolText::single(format!("Cohort not found: {cohort_id}"))),
            Err(err) => return Ok(failure("loading cohort", &err)),
        };

        let mut text = format!(
            "Loaded Cohort Definition:\n\n\
             ID: {}\nName: {}\nDescription: {}\nCreated: {}\nModified: {}\n\n\
             WebAPI URL: {}\n\nDefinition Summary:\n",
            cohort.id,
            cohort.name,
            non_blank(cohort.description.as_deref()).unwrap_or("No description"),
            display_timestamp(cohort.created_date.as_ref()),
            display_timestamp(cohort.modified_date.as_ref()),
            api.cohort_url(cohort.id),
        );

        match cohort.expression.as_ref().filter(|expression| expression.is_object()) {
            Some(expression) => {
                write_loaded_summary(&mut text, expression);
                let pretty = serde_json::to_string_pretty(expression)
                    .unwrap_or_else(|err| format!("<unserializable: {err}>"));
                let _ = write!(text, "\nFull Definition JSON:\n{pretty}");
            }
            None => text.push_str("Definition details not available"),
        }

        Ok(ToolText::single(text))
    }

    /// Lists cohort definitions, optionally filtered by a name substring.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_cohorts(&self, request: ListCohortsRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let mut cohorts = match api.client().list_cohort_definitions().await {
            Ok(cohorts) => cohorts,
            Err(err) => return Ok(failure("listing cohorts", &err)),
        };

        let term = non_blank(request.search_term.as_deref());
        if let Some(term) = term {
            let needle = term.to_lowercase();
            cohorts.retain(|cohort| cohort.name.to_lowercase().contains(&needle));
        }
        cohorts.truncate(request.limit);

        let matching = term.map(|term| format!(" matching '{term}'")).unwrap_or_default();
        if cohorts.is_empty() {
            return Ok(ToolText::single(format!("No cohorts found{matching}")));
        }

        let mut text = String::from("Available Cohort Definitions");
        if let Some(term) = term {
            let _ = write!(text, " (matching '{term}')");
        }
        text.push_str(":\n\n");
        for cohort in &cohorts {
            let _ = writeln!(text, "ID {}: {}", cohort.id, cohort.name);
            if let Some(description) = non_blank(cohort.description.as_deref()) {
                let _ = writeln!(text, "  Description: {}", preview(description));
            }
            let _ = writeln!(text, "  Created: {}", display_timestamp(cohort.created_date.as_ref()));
            let _ = writeln!(text, "  URL: {}\n", api.cohort_url(cohort.id));
        }
        if cohorts.len() == request.limit {
            let _ = writeln!(text, "(Showing first {} results)", request.limit);
        }
        let _ = write!(text, "\nTotal: {} cohorts{matching}", cohorts.len());

        Ok(ToolText::single(text))
    }

    /// Copies a cohort, overwriting existing top-level keys from `modifications`.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn clone_cohort(&self, request: CloneCohortRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let source_id = request.source_cohort_id;
        let source = match api.client().get_cohort_definition(source_id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                return Ok(ToolText::single(format!("Source cohort not found: {source_id}")));
            }
            Err(err) => return Ok(failure("cloning cohort", &err)),
        };
        let Some(Value::Object(mut expression)) = source.expression.clone() else {
            return Ok(ToolText::single(format!(
                "Could not load definition for cohort {source_id}"
            )));
        };

        let overlay = request
            .modifications
            .as_ref()
            .map(|modifications| apply_modifications(&mut expression, modifications))
            .unwrap_or_default();
        let expression = Value::Object(expression);

        let description = non_blank(request.new_description.as_deref())
            .map_or_else(|| format!("Clone of {}", source.name), str::to_string);
        let draft = CohortDefinitionDraft::simple(request.new_name.clone(), description, expression);
        let cloned = match api.client().create_cohort_definition(&draft).await {
            Ok(cloned) => cloned,
            Err(err) => return Ok(failure("cloning cohort", &err)),
        };

        let mut text = format!(
            "✅ Cohort Cloned Successfully!\n\n\
             Source Cohort:\n  ID: {}\n  Name: {}\n\n\
             Cloned Cohort:\n  ID: {}\n  Name: {}\n  Description: {}\n\n\
             WebAPI URL: {}\n\nModifications Applied:\n",
            source.id,
            source.name,
            cloned.id,
            cloned.name,
            cloned.description.as_deref().unwrap_or(&draft.description),
            api.cohort_url(cloned.id),
        );
        if overlay.is_empty() {
            text.push_str("  - No modifications (exact clone)\n");
        }
        for key in &overlay.applied {
            let _ = writeln!(text, "  - {key}: Modified");
        }
        for key in &overlay.ignored {
            let _ = writeln!(text, "  - {key}: Ignored (not present in source)");
        }
        let _ = write!(
            text,
            "\nClone Summary:\n{}\nThe cloned cohort is now available for generation and analysis.\n",
            definition_summary(&draft.expression)
        );

        Ok(ToolText::single(text))
    }
}

enum NameMatch<'a> {
    None,
    Single(&'a CohortDefinition),
    Ambiguous(Vec<&'a CohortDefinition>),
}

/// Exact case-insensitive match first, then substring; never picks among several.
fn match_by_name<'a>(cohorts: &'a [CohortDefinition], name: &str) -> NameMatch<'a> {
    let needle = name.to_lowercase();
    let mut matches: Vec<&CohortDefinition> = cohorts
        .iter()
        .filter(|cohort| cohort.name.to_lowercase() == needle)
        .collect();
    if matches.is_empty() {
        matches = cohorts
            .iter()
            .filter(|cohort| cohort.name.to_lowercase().contains(&needle))
            .collect();
    }
    match matches.len() {
        0 => NameMatch::None,
        1 => NameMatch::Single(matches[0]),
        _ => NameMatch::Ambiguous(matches),
    }
}

fn write_loaded_summary(text: &mut String, expression: &Value) {
    let concept_sets = expression
        .get("ConceptSets")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    let _ = writeln!(text, "- Concept Sets: {}", concept_sets.len());
    for concept_set in concept_sets.iter().take(SUMMARY_PREVIEW) {
        let name = concept_set.get("name").and_then(Value::as_str).unwrap_or("Unnamed");
        let count = concept_set
            .get("expression")
            .and_then(|expression| expression.get("items"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let _ = writeln!(text, "  * {name}: {count} concepts");
    }
    if concept_sets.len() > SUMMARY_PREVIEW {
        let _ = writeln!(text, "  ... and {} more", concept_sets.len() - SUMMARY_PREVIEW);
    }

    let rules = expression
        .get("InclusionRules")
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice);
    let _ = writeln!(text, "- Inclusion Rules: {}", rules.len());
    for rule in rules.iter().take(SUMMARY_PREVIEW) {
        let name = rule.get("name").and_then(Value::as_str).unwrap_or("Unnamed rule");
        let _ = writeln!(text, "  * {name}");
    }
    if rules.len() > SUMMARY_PREVIEW {
        let _ = writeln!(text, "  ... and {} more", rules.len() - SUMMARY_PREVIEW);
    }

    let _ = writeln!(text, "- Primary Criteria: {}", primary_criteria_label(expression));
}

fn preview(description: &str) -> String {
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let head: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        description.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FAKE_BASE_URL, FakeWebApi, cohort};
    use serde_json::json;

    fn expression() -> Value {
        json!({
            "ConceptSets": [{"id": 0, "name": "T2DM", "expression": {"items": [{}, {}]}}],
            "PrimaryCriteria": {"CriteriaList": [{"ConditionOccurrence": {"CodesetId": 0}}]},
            "InclusionRules": [{"name": "adult"}, {}]
        })
    }

    #[tokio::test]
    async fn save_wraps_expression_in_simple_envelope() {
        let fake = FakeWebApi::default().with_cohort(cohort(4, "Existing", json!({})));
        let text = fake
            .control_plane()
            .save_cohort_definition(SaveCohortRequest {
                name: "T2DM new users".to_string(),
                cohort_definition: expression(),
                description: None,
            })
            .await
            .expect("save should run")
            .joined();

        let created = fake.created_cohorts();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].expression_type, "SIMPLE_EXPRESSION");
        assert_eq!(created[0].description, "Cohort created via MCP: T2DM new users");
        assert_eq!(created[0].expression, expression());

        assert!(text.starts_with("✅ Cohort Definition Saved Successfully!\n\nCohort ID: 5\nName: T2DM new users\n"));
        assert!(text.contains(&format!("WebAPI URL: {FAKE_BASE_URL}/cohortdefinition/5\n")));
        assert!(text.ends_with(
            "Cohort Definition Summary:\n- Concept Sets: 1\n- Inclusion Rules: 2\n- Primary Criteria: Defined\n"
        ));
    }

    #[tokio::test]
    async fn load_requires_id_or_name() {
        let result = FakeWebApi::default()
            .control_plane()
            .load_existing_cohort(LoadCohortRequest {
                cohort_id: None,
                cohort_name: Some("  ".to_string()),
            })
            .await;
        assert_eq!(
            result,
            Err(ControlError::InvalidInput(
                "Either cohort_id or cohort_name must be provided".to_string()
            ))
        );
    }

    fn catalogue() -> FakeWebApi {
        FakeWebApi::default()
            .with_cohort(cohort(1, "Diabetes", expression()))
            .with_cohort(cohort(2, "Diabetes type 2", json!({})))
            .with_cohort(cohort(3, "Type 1 diabetes", json!({})))
    }

    #[tokio::test]
    async fn exact_name_match_wins_over_substrings() {
        let text = catalogue()
            .control_plane()
            .load_existing_cohort(LoadCohortRequest {
                cohort_id: None,
                cohort_name: Some("DIABETES".to_string()),
            })
            .await
            .expect("load should run")
            .joined();

        assert!(text.starts_with("Loaded Cohort Definition:\n\nID: 1\nName: Diabetes\nDescription: No description\n"));
        assert!(text.contains(
            "Definition Summary:\n- Concept Sets: 1\n  * T2DM: 2 concepts\n- Inclusion Rules: 2\n  * adult\n  * Unnamed rule\n- Primary Criteria: Defined\n"
        ));
        assert!(text.contains("\nFull Definition JSON:\n{"));
    }

    #[tokio::test]
    async fn several_substring_matches_are_ambiguous() {
        let text = catalogue()
            .control_plane()
            .load_existing_cohort(LoadCohortRequest {
                cohort_id: None,
                cohort_name: Some("diab".to_string()),
            })
            .await
            .expect("load should run")
            .joined();
        assert_eq!(
            text,
            "Multiple cohorts found matching 'diab':\n\n  - ID 1: Diabetes\n  - ID 2: Diabetes type 2\n  - ID 3: Type 1 diabetes\n\n\
             Please specify a cohort_id or use a more specific name."
        );
    }

    #[tokio::test]
    async fn unknown_id_and_name_are_reported() {
        let control = catalogue().control_plane();
        let by_id = control
            .load_existing_cohort(LoadCohortRequest {
                cohort_id: Some(99),
                cohort_name: None,
            })
            .await
            .expect("load should run");
        assert_eq!(by_id.joined(), "Cohort not found: 99");

        let by_name = control
            .load_existing_cohort(LoadCohortRequest {
                cohort_id: None,
                cohort_name: Some("asthma".to_string()),
            })
            .await
            .expect("load should run");
        assert_eq!(by_name.joined(), "No cohort found with name containing: 'asthma'");
    }

    #[tokio::test]
    async fn list_filters_and_reports_the_cap() {
        let text = catalogue()
            .control_plane()
            .list_cohorts(ListCohortsRequest {
                limit: 2,
                search_term: Some("diabetes".to_string()),
            })
            .await
            .expect("list should run")
            .joined();

        assert!(text.starts_with("Available Cohort Definitions (matching 'diabetes'):\n\nID 1: Diabetes\n"));
        assert!(!text.contains("ID 3"));
        assert!(text.ends_with("(Showing first 2 results)\n\nTotal: 2 cohorts matching 'diabetes'"));

        let empty = catalogue()
            .control_plane()
            .list_cohorts(ListCohortsRequest {
                limit: 20,
                search_term: Some("asthma".to_string()),
            })
            .await
            .expect("list should run");
        assert_eq!(empty.joined(), "No cohorts found matching 'asthma'");
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(120);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(100)));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn self_comparison_renders_full_similarity() {
        let text = compare_cohorts(&CompareCohortsRequest {
            cohort_a: expression(),
            cohort_b: expression(),
            cohort_a_name: default_cohort_a_name(),
            cohort_b_name: default_cohort_b_name(),
        })
        .joined();
        assert!(text.starts_with("Cohort Comparison: Cohort A vs Cohort B\n\n"));
        assert!(text.contains("Structural similarity: 100%"));
    }

    #[tokio::test]
    async fn clone_without_modifications_copies_the_expression() {
        let fake = catalogue();
        let text = fake
            .control_plane()
            .clone_cohort(CloneCohortRequest {
                source_cohort_id: 1,
                new_name: "Diabetes copy".to_string(),
                modifications: None,
                new_description: None,
            })
            .await
            .expect("clone should run")
            .joined();

        let created = fake.created_cohorts();
        assert_eq!(created[0].expression, expression());
        assert_eq!(created[0].description, "Clone of Diabetes");
        assert!(text.contains("Source Cohort:\n  ID: 1\n  Name: Diabetes\n\nCloned Cohort:\n  ID: 4\n  Name: Diabetes copy\n"));
        assert!(text.contains("Modifications Applied:\n  - No modifications (exact clone)\n"));
        assert!(text.ends_with("- Primary Criteria: Defined\n\nThe cloned cohort is now available for generation and analysis.\n"));
    }

    #[tokio::test]
    async fn clone_overwrites_only_existing_keys() {
        let fake = catalogue();
        let modifications = match json!({"InclusionRules": [], "Title": "ignored"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let text = fake
            .control_plane()
            .clone_cohort(CloneCohortRequest {
                source_cohort_id: 1,
                new_name: "No rules".to_string(),
                modifications: Some(modifications),
                new_description: Some("trimmed".to_string()),
            })
            .await
            .expect("clone should run")
            .joined();

        let created = fake.created_cohorts();
        assert_eq!(created[0].expression["InclusionRules"], json!([]));
        assert_eq!(created[0].expression["ConceptSets"], expression()["ConceptSets"]);
        assert!(created[0].expression.get("Title").is_none());
        assert!(text.contains("  - InclusionRules: Modified\n  - Title: Ignored (not present in source)\n"));
        assert!(text.contains("- Inclusion Rules: 0\n"));
    }

    #[tokio::test]
    async fn clone_of_missing_cohort_is_reported() {
        let text = FakeWebApi::default()
            .control_plane()
            .clone_cohort(CloneCohortRequest {
                source_cohort_id: 8,
                new_name: "x".to_string(),
                modifications: None,
                new_description: None,
            })
            .await
            .expect("clone should run");
        assert_eq!(text.joined(), "Source cohort not found: 8");
    }
}
