use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use webapi_models::models::{Concept, ConceptSearch, RelatedConcept};

use crate::client::WebApi;
use crate::text::ToolText;

use super::{ControlError, WebApiControlPlane, failure, non_blank, yes_no};

/// Largest page the vocabulary search endpoint serves.
pub const MAX_SEARCH_PAGE: usize = 100;
pub const DEFAULT_RESULT_LIMIT: usize = 20;
const RELATED_PREVIEW: usize = 10;
const OTHER_VOCABULARY_PREVIEW: usize = 20;

const CLINICAL_DOMAINS: &[&str] = &["Condition", "Drug", "Procedure", "Measurement", "Observation", "Device"];
const ADMINISTRATIVE_DOMAINS: &[&str] = &["Visit", "Provider", "Payer", "Care Site"];
const STANDARD_VOCABULARIES: &[&str] = &["SNOMED", "RxNorm", "LOINC", "ICD10CM", "CPT4", "ICD10PCS"];
const CLASSIFICATION_VOCABULARIES: &[&str] = &["ICD9CM", "ICD9Proc", "NDC", "HCPCS"];

pub(crate) const fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

pub(crate) const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConceptsRequest {
    pub query: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub vocabulary: Option<String>,
    #[serde(default)]
    pub concept_class: Option<String>,
    #[serde(default = "default_true")]
    pub standard_only: bool,
    #[serde(default)]
    pub include_invalid: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl SearchConceptsRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            domain: None,
            vocabulary: None,
            concept_class: None,
            standard_only: true,
            include_invalid: false,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }

    fn search(&self) -> ConceptSearch {
        ConceptSearch::new(self.query.clone(), self.limit.min(MAX_SEARCH_PAGE))
            .with_domain(non_blank(self.domain.as_deref()))
            .with_vocabulary(non_blank(self.vocabulary.as_deref()))
            .with_concept_class(non_blank(self.concept_class.as_deref()))
            .standard_only(self.standard_only)
            .include_invalid(self.include_invalid)
    }

    fn filter_summary(&self) -> String {
        let mut filters = Vec::new();
        if let Some(domain) = non_blank(self.domain.as_deref()) {
            filters.push(format!("Domain: {domain}"));
        }
        if let Some(vocabulary) = non_blank(self.vocabulary.as_deref()) {
            filters.push(format!("Vocabulary: {vocabulary}"));
        }
        if let Some(concept_class) = non_blank(self.concept_class.as_deref()) {
            filters.push(format!("Class: {concept_class}"));
        }
        if self.standard_only {
            filters.push("Standard concepts only".to_string());
        }
        if !self.include_invalid {
            filters.push("Valid concepts only".to_string());
        }
        if filters.is_empty() {
            String::new()
        } else {
            format!(" ({})", filters.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptDetailsRequest {
    pub concept_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyDirection {
    #[default]
    Descendants,
    Ancestors,
    Both,
}

impl HierarchyDirection {
    const fn includes_ancestors(self) -> bool {
        matches!(self, Self::Ancestors | Self::Both)
    }

    const fn includes_descendants(self) -> bool {
        matches!(self, Self::Descendants | Self::Both)
    }
}

const fn default_max_levels() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseHierarchyRequest {
    pub concept_id: i64,
    #[serde(default)]
    pub direction: HierarchyDirection,
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Searches the vocabulary; one header block plus one block per concept.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn search_concepts(&self, request: SearchConceptsRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let concepts = match api.client().search_concepts(&request.search()).await {
            Ok(concepts) => concepts,
            Err(err) => return Ok(failure("searching concepts", &err)),
        };

        if concepts.is_empty() {
            return Ok(ToolText::single(format!(
                "No concepts found for query: '{}'",
                request.query
            )));
        }

        let mut text = ToolText::single(format!(
            "Found {} concepts for '{}'{}:",
            concepts.len(),
            request.query,
            request.filter_summary()
        ));
        for concept in concepts.iter().take(request.limit) {
            text.push(concept_block(concept));
        }
        Ok(text)
    }

    /// Describes one concept and up to ten related concepts.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_concept_details(&self, request: ConceptDetailsRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let concept_id = request.concept_id;
        let concept = match api.client().get_concept(concept_id).await {
            Ok(Some(concept)) => concept,
            Ok(None) => {
                return Ok(ToolText::single(format!("No concept found with ID: {concept_id}")));
            }
            Err(err) => return Ok(failure("retrieving concept details", &err)),
        };

        let valid = concept
            .invalid_reason_code()
            .map_or_else(|| "Yes".to_string(), |reason| format!("No ({reason})"));
        let mut details = format!(
            "Concept Details for {concept_id}:\n\n\
             Name: {}\nDomain: {}\nVocabulary: {}\nConcept Class: {}\nConcept Code: {}\n\
             Standard Concept: {}\nValid: {valid}\n\nRelated Concepts:",
            concept.concept_name,
            concept.domain_id,
            concept.vocabulary_id,
            concept.concept_class_id,
            concept.code(),
            yes_no(concept.is_standard()),
        );

        match api.client().related_concepts(concept_id).await {
            Ok(related) if related.is_empty() => details.push_str("\n  No related concepts found"),
            Ok(related) => {
                for entry in related.iter().take(RELATED_PREVIEW) {
                    let _ = write!(
                        details,
                        "\n  - {} ({})",
                        entry.concept.concept_name, entry.concept.concept_id
                    );
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, concept_id, "related concepts unavailable");
                details.push_str("\n  Related concepts not available");
            }
        }

        Ok(ToolText::single(details))
    }

    /// Walks ancestors and/or descendants of a concept.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn browse_concept_hierarchy(
        &self,
        request: BrowseHierarchyRequest,
    ) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let BrowseHierarchyRequest {
            concept_id,
            direction,
            max_levels,
            limit,
        } = request;

        let root = match api.client().get_concept(concept_id).await {
            Ok(Some(root)) => root,
            Ok(None) => {
                return Ok(ToolText::single(format!("No concept found with ID: {concept_id}")));
            }
            Err(err) => return Ok(failure("browsing hierarchy", &err)),
        };

        let mut text = format!(
            "Concept Hierarchy for {} ({concept_id}):\n\n",
            root.concept_name
        );

        if direction.includes_ancestors() {
            text.push_str("ANCESTORS:\n");
            match api.client().related_concepts(concept_id).await {
                Ok(related) => {
                    let ancestors: Vec<_> = related
                        .into_iter()
                        .filter(|entry| entry.has_relationship_containing("ancestor"))
                        .collect();
                    write_level(&mut text, &ancestors, concept_id, max_levels, limit, '↑', "No ancestors found");
                }
                Err(err) => {
                    let _ = writeln!(text, "  Error retrieving ancestors: {err}");
                }
            }
            text.push('\n');
        }

        let _ = write!(text, "ROOT: {} ({concept_id})\n\n", root.concept_name);

        if direction.includes_descendants() {
            text.push_str("DESCENDANTS:\n");
            match api.client().descendant_concepts(concept_id).await {
                Ok(descendants) => {
                    write_level(&mut text, &descendants, concept_id, max_levels, limit, '↓', "No descendants found");
                }
                Err(err) => {
                    let _ = writeln!(text, "  Error retrieving descendants: {err}");
                }
            }
        }

        if limit < DEFAULT_RESULT_LIMIT {
            let _ = write!(text, "\n(Limited to {limit} concepts per direction)");
        }

        Ok(ToolText::single(text))
    }

    /// Lists domains grouped into clinical, administrative, and other.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_domains(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let domains = match api.client().list_domains().await {
            Ok(domains) => domains,
            Err(err) => return Ok(failure("retrieving domains", &err)),
        };
        if domains.is_empty() {
            return Ok(ToolText::single("No domains found or domains not available"));
        }

        let mut clinical = Vec::new();
        let mut administrative = Vec::new();
        let mut other = Vec::new();
        for domain in &domains {
            let id = domain.domain_id.as_str();
            if CLINICAL_DOMAINS.contains(&id) {
                clinical.push(id);
            } else if ADMINISTRATIVE_DOMAINS.contains(&id) {
                administrative.push(id);
            } else {
                other.push(id);
            }
        }

        let mut text = String::from("Available OMOP Domains:\n\n");
        for (title, mut group, trailing_blank) in [
            ("Clinical Domains", clinical, true),
            ("Administrative Domains", administrative, true),
            ("Other Domains", other, false),
        ] {
            if group.is_empty() {
                continue;
            }
            group.sort_unstable();
            let _ = writeln!(text, "{title}:");
            for id in group {
                let _ = writeln!(text, "  - {id}");
            }
            if trailing_blank {
                text.push('\n');
            }
        }
        let _ = write!(text, "\nTotal: {} domains available", domains.len());

        Ok(ToolText::single(text))
    }

    /// Lists vocabularies grouped into standard, classification, and other.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_vocabularies(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let vocabularies = match api.client().list_vocabularies().await {
            Ok(vocabularies) => vocabularies,
            Err(err) => return Ok(failure("retrieving vocabularies", &err)),
        };
        if vocabularies.is_empty() {
            return Ok(ToolText::single(
                "No vocabularies found or vocabularies not available",
            ));
        }

        let mut standard = Vec::new();
        let mut classification = Vec::new();
        let mut other = Vec::new();
        for vocabulary in &vocabularies {
            let entry = (vocabulary.vocabulary_id.as_str(), vocabulary.display_name());
            if STANDARD_VOCABULARIES.contains(&entry.0) {
                standard.push(entry);
            } else if CLASSIFICATION_VOCABULARIES.contains(&entry.0) {
                classification.push(entry);
            } else {
                other.push(entry);
            }
        }

        let mut text = String::from("Available OMOP Vocabularies:\n\n");
        for (title, mut group) in [
            ("Standard Vocabularies", standard),
            ("Classification Vocabularies", classification),
        ] {
            if group.is_empty() {
                continue;
            }
            group.sort_unstable();
            let _ = writeln!(text, "{title}:");
            for (id, name) in group {
                let _ = writeln!(text, "  - {id}: {name}");
            }
            text.push('\n');
        }
        if !other.is_empty() {
            other.sort_unstable();
            text.push_str("Other Vocabularies:\n");
            for (id, name) in other.iter().take(OTHER_VOCABULARY_PREVIEW) {
                let _ = writeln!(text, "  - {id}: {name}");
            }
            if other.len() > OTHER_VOCABULARY_PREVIEW {
                let _ = writeln!(text, "  ... and {} more", other.len() - OTHER_VOCABULARY_PREVIEW);
            }
        }
        let _ = write!(text, "\nTotal: {} vocabularies available", vocabularies.len());

        Ok(ToolText::single(text))
    }
}

fn concept_block(concept: &Concept) -> String {
    let standard = if concept.is_standard() {
        "Standard"
    } else {
        "Non-standard"
    };
    let invalid = concept
        .invalid_reason_code()
        .map(|reason| format!(" [INVALID: {reason}]"))
        .unwrap_or_default();
    format!(
        "• {} (ID: {})\n  Domain: {} | Vocabulary: {}\n  Class: {} | Code: {}\n  {standard}{invalid}",
        concept.concept_name,
        concept.concept_id,
        concept.domain_id,
        concept.vocabulary_id,
        concept.concept_class_id,
        concept.code(),
    )
}

/// Writes one hierarchy direction. Levels come from the relationship distance;
/// entries beyond `max_levels` and the root itself are skipped.
fn write_level(
    text: &mut String,
    entries: &[RelatedConcept],
    root_id: i64,
    max_levels: u32,
    limit: usize,
    arrow: char,
    empty: &str,
) {
    let mut shown = 0;
    for entry in entries {
        if shown == limit {
            break;
        }
        if entry.concept.concept_id == root_id {
            continue;
        }
        let level = entry.distance().unwrap_or(1).max(1);
        if level > max_levels {
            continue;
        }
        let indent = "  ".repeat(usize::try_from(level - 1).unwrap_or(0));
        let _ = writeln!(
            text,
            "  {indent}{arrow} {} ({})",
            entry.concept.concept_name, entry.concept.concept_id
        );
        shown += 1;
    }
    if shown == 0 {
        let _ = writeln!(text, "  {empty}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWebApi, concept, related};
    use webapi_models::models::{Domain, Vocabulary};

    fn request(query: &str) -> SearchConceptsRequest {
        SearchConceptsRequest::new(query)
    }

    #[tokio::test]
    async fn search_renders_header_and_one_block_per_concept() {
        let fake = FakeWebApi::default().with_search_results(
            "diabetes",
            vec![
                concept(201_826, "Type 2 diabetes mellitus", "Condition"),
                concept(201_254, "Type 1 diabetes mellitus", "Condition"),
            ],
        );
        let mut search = request("diabetes");
        search.domain = Some("Condition".to_string());
        search.limit = 5;

        let text = fake
            .control_plane()
            .search_concepts(search)
            .await
            .expect("search should run");

        assert_eq!(text.len(), 3);
        assert_eq!(
            text.blocks()[0],
            "Found 2 concepts for 'diabetes' (Domain: Condition, Standard concepts only, Valid concepts only):"
        );
        assert_eq!(
            text.blocks()[1],
            "• Type 2 diabetes mellitus (ID: 201826)\n  Domain: Condition | Vocabulary: SNOMED\n  Class: Clinical Finding | Code: C201826\n  Standard"
        );

        let recorded = fake.recorded_searches();
        assert_eq!(recorded[0].page_size, 5);
        assert_eq!(recorded[0].domain_id, vec!["Condition".to_string()]);
    }

    #[tokio::test]
    async fn search_clamps_page_size_but_renders_requested_limit() {
        let fake = FakeWebApi::default();
        let mut search = request("anything");
        search.limit = 500;
        let text = fake
            .control_plane()
            .search_concepts(search)
            .await
            .expect("search should run");

        assert_eq!(text.blocks(), ["No concepts found for query: 'anything'"]);
        assert_eq!(fake.recorded_searches()[0].page_size, MAX_SEARCH_PAGE);
    }

    #[tokio::test]
    async fn search_failure_becomes_text() {
        let fake = FakeWebApi::default().with_failing_query("boom");
        let text = fake
            .control_plane()
            .search_concepts(request("boom"))
            .await
            .expect("failure is rendered");
        assert!(text.blocks()[0].starts_with("Error searching concepts: WebAPI returned 500"));
    }

    #[tokio::test]
    async fn missing_base_url_is_an_error() {
        let fake = FakeWebApi::default();
        let control = fake.control_plane_with(crate::services::WebApiSettings::default());
        assert_eq!(
            control.search_concepts(request("x")).await,
            Err(ControlError::MissingSetting(crate::services::ENV_BASE_URL))
        );
    }

    #[tokio::test]
    async fn concept_details_lists_related_concepts() {
        let root = concept(201_826, "Type 2 diabetes mellitus", "Condition");
        let fake = FakeWebApi::default()
            .with_concept(root)
            .with_related(
                201_826,
                vec![related(concept(201_820, "Diabetes mellitus", "Condition"), "Has ancestor of", 1)],
            );

        let text = fake
            .control_plane()
            .get_concept_details(ConceptDetailsRequest { concept_id: 201_826 })
            .await
            .expect("details should render");
        let body = text.joined();

        assert!(body.starts_with("Concept Details for 201826:\n\nName: Type 2 diabetes mellitus\n"));
        assert!(body.contains("Standard Concept: Yes\nValid: Yes\n\nRelated Concepts:"));
        assert!(body.ends_with("\n  - Diabetes mellitus (201820)"));
    }

    #[tokio::test]
    async fn unknown_concept_is_reported() {
        let text = FakeWebApi::default()
            .control_plane()
            .get_concept_details(ConceptDetailsRequest { concept_id: 9 })
            .await
            .expect("lookup should run");
        assert_eq!(text.joined(), "No concept found with ID: 9");
    }

    #[tokio::test]
    async fn hierarchy_filters_ancestors_and_depth() {
        let fake = FakeWebApi::default()
            .with_concept(concept(10, "Root", "Condition"))
            .with_related(
                10,
                vec![
                    related(concept(1, "Parent", "Condition"), "Has ancestor of", 1),
                    related(concept(2, "Grandparent", "Condition"), "Has ancestor of", 2),
                    related(concept(3, "Distant", "Condition"), "Has ancestor of", 3),
                    related(concept(4, "Mapped", "Condition"), "Maps to", 0),
                ],
            )
            .with_descendants(
                10,
                vec![
                    related(concept(10, "Root", "Condition"), "Has descendant of", 0),
                    related(concept(11, "Child", "Condition"), "Has descendant of", 1),
                ],
            );

        let text = fake
            .control_plane()
            .browse_concept_hierarchy(BrowseHierarchyRequest {
                concept_id: 10,
                direction: HierarchyDirection::Both,
                max_levels: 2,
                limit: 5,
            })
            .await
            .expect("hierarchy should render");

        assert_eq!(
            text.joined(),
            "Concept Hierarchy for Root (10):\n\n\
             ANCESTORS:\n  ↑ Parent (1)\n    ↑ Grandparent (2)\n\n\
             ROOT: Root (10)\n\n\
             DESCENDANTS:\n  ↓ Child (11)\n\n\
             (Limited to 5 concepts per direction)"
        );
    }

    #[tokio::test]
    async fn hierarchy_without_descendants_says_so() {
        let fake = FakeWebApi::default().with_concept(concept(10, "Leaf", "Condition"));
        let text = fake
            .control_plane()
            .browse_concept_hierarchy(BrowseHierarchyRequest {
                concept_id: 10,
                direction: HierarchyDirection::Descendants,
                max_levels: 2,
                limit: DEFAULT_RESULT_LIMIT,
            })
            .await
            .expect("hierarchy should render");
        assert_eq!(
            text.joined(),
            "Concept Hierarchy for Leaf (10):\n\nROOT: Leaf (10)\n\nDESCENDANTS:\n  No descendants found\n"
        );
    }

    #[tokio::test]
    async fn domains_are_grouped_and_sorted() {
        let domain = |id: &str| Domain {
            domain_id: id.to_string(),
            domain_name: None,
        };
        let fake = FakeWebApi::default().with_domains(vec![
            domain("Drug"),
            domain("Visit"),
            domain("Condition"),
            domain("Metadata"),
        ]);
        let text = fake
            .control_plane()
            .list_domains()
            .await
            .expect("domains should render");
        assert_eq!(
            text.joined(),
            "Available OMOP Domains:\n\n\
             Clinical Domains:\n  - Condition\n  - Drug\n\n\
             Administrative Domains:\n  - Visit\n\n\
             Other Domains:\n  - Metadata\n\
             \nTotal: 4 domains available"
        );
    }

    #[tokio::test]
    async fn other_vocabularies_are_capped() {
        let mut vocabularies = vec![Vocabulary {
            vocabulary_id: "SNOMED".to_string(),
            vocabulary_name: Some("Systematic Nomenclature".to_string()),
            vocabulary_version: None,
        }];
        vocabularies.extend((0..22).map(|index| Vocabulary {
            vocabulary_id: format!("V{index:02}"),
            vocabulary_name: None,
            vocabulary_version: None,
        }));
        let text = FakeWebApi::default()
            .with_vocabularies(vocabularies)
            .control_plane()
            .list_vocabularies()
            .await
            .expect("vocabularies should render");
        let body = text.joined();

        assert!(body.contains("Standard Vocabularies:\n  - SNOMED: Systematic Nomenclature\n\n"));
        assert!(body.contains("  - V19: V19\n  ... and 2 more\n"));
        assert!(!body.contains("V20"));
        assert!(body.ends_with("\nTotal: 23 vocabularies available"));
    }
}
