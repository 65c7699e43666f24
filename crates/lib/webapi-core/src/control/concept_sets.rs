use std::fmt::Write as _;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use webapi_models::models::{Concept, ConceptSearch, display_timestamp};
use webapi_models::schema::{ConceptSet, ConceptSetExpression, ConceptSetItem};

use crate::client::{ClientError, WebApi};
use crate::text::ToolText;

use super::vocabulary::default_true;
use super::{ControlError, WebApiControlPlane, failure, non_blank, yes_no};

const CONCEPT_PREVIEW: usize = 10;

const fn default_max_concepts_per_query() -> usize {
    10
}

/// What a failed query does to a search-based concept set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFailurePolicy {
    /// Record the failure in the manifest and keep the other queries' hits.
    #[default]
    BestEffort,
    /// Abort the whole concept set on the first failed query.
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConceptSetRequest {
    pub name: String,
    pub concept_ids: Vec<i64>,
    #[serde(default = "default_true")]
    pub include_descendants: bool,
    #[serde(default)]
    pub include_mapped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConceptSetFromSearchRequest {
    pub name: String,
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub vocabulary: Option<String>,
    #[serde(default = "default_true")]
    pub include_descendants: bool,
    #[serde(default)]
    pub include_mapped: bool,
    #[serde(default = "default_max_concepts_per_query")]
    pub max_concepts_per_query: usize,
    #[serde(default)]
    pub failure_policy: QueryFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSetDetailsRequest {
    pub concept_set_id: i64,
}

enum QueryOutcome {
    Found(usize),
    Empty,
    Failed(ClientError),
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Builds a concept set from explicit concept ids.
    ///
    /// Ids are resolved in order and the first unresolved id aborts the whole set.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn create_concept_set(&self, request: CreateConceptSetRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let CreateConceptSetRequest {
            name,
            concept_ids,
            include_descendants,
            include_mapped,
        } = request;

        let mut concepts = Vec::with_capacity(concept_ids.len());
        for concept_id in concept_ids {
            match api.client().get_concept(concept_id).await {
                Ok(Some(concept)) => concepts.push(concept),
                Ok(None) => {
                    return Ok(ToolText::single(format!("Concept not found: {concept_id}")));
                }
                Err(err) => return Ok(failure(&format!("retrieving concept {concept_id}"), &err)),
            }
        }

        let expression = build_expression(concepts, include_descendants, include_mapped);
        let mut text = format!(
            "Created concept set '{name}' with {} concepts:\n\nConcepts included:\n",
            expression.len()
        );
        for item in &expression.items {
            let concept = &item.concept;
            let _ = writeln!(
                text,
                "  - {} ({}) [{}/{}]",
                concept.concept_name, concept.concept_id, concept.domain_id, concept.vocabulary_id
            );
        }
        let _ = write!(
            text,
            "\nSettings:\n  - Include descendants: {}\n  - Include mapped: {}",
            yes_no(include_descendants),
            yes_no(include_mapped)
        );
        push_concept_set_json(&mut text, &ConceptSet::new(name, expression));

        Ok(ToolText::single(text))
    }

    /// Builds a concept set from several searches run concurrently.
    ///
    /// Hits are concatenated in query order and deduplicated by concept id,
    /// keeping the first occurrence.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn create_concept_set_from_search(
        &self,
        request: CreateConceptSetFromSearchRequest,
    ) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let domain = non_blank(request.domain.as_deref());
        let vocabulary = non_blank(request.vocabulary.as_deref());
        let per_query = request.max_concepts_per_query;

        let searches: Vec<ConceptSearch> = request
            .search_queries
            .iter()
            .map(|query| {
                ConceptSearch::new(query.clone(), per_query)
                    .with_domain(domain)
                    .with_vocabulary(vocabulary)
                    .standard_only(true)
                    .include_invalid(false)
            })
            .collect();
        let results = join_all(
            searches
                .iter()
                .map(|search| api.client().search_concepts(search)),
        )
        .await;

        let mut hits: Vec<Concept> = Vec::new();
        let mut outcomes = Vec::with_capacity(results.len());
        for (query, result) in request.search_queries.iter().zip(results) {
            match result {
                Ok(mut concepts) if !concepts.is_empty() => {
                    outcomes.push((query, QueryOutcome::Found(concepts.len())));
                    concepts.truncate(per_query);
                    hits.extend(concepts);
                }
                Ok(_) => outcomes.push((query, QueryOutcome::Empty)),
                Err(err) if request.failure_policy == QueryFailurePolicy::FailFast => {
                    return Ok(failure(
                        "creating concept set",
                        &format!("search for '{query}' failed: {err}"),
                    ));
                }
                Err(err) => {
                    tracing::warn!(error = %err, query = %query, "concept search failed");
                    outcomes.push((query, QueryOutcome::Failed(err)));
                }
            }
        }

        let expression = build_expression(hits, request.include_descendants, request.include_mapped);

        let mut text = format!(
            "Created concept set '{}' with {} unique concepts:\n\nSearch Summary:",
            request.name,
            expression.len()
        );
        for (query, outcome) in &outcomes {
            match outcome {
                QueryOutcome::Found(count) => {
                    let _ = write!(text, "\n  - '{query}': found {count} concepts");
                }
                QueryOutcome::Empty => {
                    let _ = write!(text, "\n  - '{query}': no concepts found");
                }
                QueryOutcome::Failed(err) => {
                    let _ = write!(text, "\n  - '{query}': search failed ({err})");
                }
            }
        }
        let _ = write!(
            text,
            "\n\nConcept Set Configuration:\n  - Include descendants: {}\n  - Include mapped: {}\n  \
             - Domain filter: {}\n  - Vocabulary filter: {}\n\nConcepts included:",
            yes_no(request.include_descendants),
            yes_no(request.include_mapped),
            domain.unwrap_or("None"),
            vocabulary.unwrap_or("None"),
        );
        for item in expression.items.iter().take(CONCEPT_PREVIEW) {
            let concept = &item.concept;
            let _ = write!(
                text,
                "\n  - {} ({}) [{}]",
                concept.concept_name, concept.concept_id, concept.vocabulary_id
            );
        }
        if expression.len() > CONCEPT_PREVIEW {
            let _ = write!(
                text,
                "\n  ... and {} more concepts",
                expression.len() - CONCEPT_PREVIEW
            );
        }
        push_concept_set_json(&mut text, &ConceptSet::new(request.name, expression));

        Ok(ToolText::single(text))
    }

    /// Lists concept sets stored on the remote service.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_concept_sets(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let concept_sets = match api.client().list_concept_sets().await {
            Ok(concept_sets) => concept_sets,
            Err(err) => return Ok(failure("retrieving concept sets", &err)),
        };
        if concept_sets.is_empty() {
            return Ok(ToolText::single("No concept sets found"));
        }

        let mut text = format!("Available Concept Sets ({} total):\n\n", concept_sets.len());
        for concept_set in &concept_sets {
            let _ = write!(text, "• {} (ID: {})", concept_set.name, concept_set.id);
            if let Some(description) = non_blank(concept_set.description.as_deref()) {
                let _ = write!(text, "\n  Description: {description}");
            }
            let _ = write!(
                text,
                "\n  Created: {}\n\n",
                display_timestamp(concept_set.created_date.as_ref())
            );
        }

        Ok(ToolText::single(text))
    }

    /// Shows a stored concept set and the first ten of its items.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_concept_set_details(
        &self,
        request: ConceptSetDetailsRequest,
    ) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let concept_set_id = request.concept_set_id;
        let summary = match api.client().get_concept_set(concept_set_id).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                return Ok(ToolText::single(format!(
                    "No concept set found with ID: {concept_set_id}"
                )));
            }
            Err(err) => return Ok(failure("retrieving concept set details", &err)),
        };
        let expression = match api.client().concept_set_expression(concept_set_id).await {
            Ok(expression) => expression,
            Err(err) => return Ok(failure("retrieving concept set details", &err)),
        };

        let mut text = format!(
            "Concept Set Details for {concept_set_id}:\n\nName: {}\nID: {}",
            summary.name, summary.id
        );
        if let Some(description) = non_blank(summary.description.as_deref()) {
            let _ = write!(text, "\nDescription: {description}");
        }

        match expression {
            Some(expression) if !expression.is_empty() => {
                let _ = write!(text, "\n\nConcepts ({} total):", expression.len());
                for item in expression.items.iter().take(CONCEPT_PREVIEW) {
                    let concept = &item.concept;
                    let _ = write!(
                        text,
                        "\n  - {} ({})\n    Domain: {} | Vocabulary: {}\n    Settings: {}, {}{}",
                        concept.concept_name,
                        concept.concept_id,
                        concept.domain_id,
                        concept.vocabulary_id,
                        if item.include_descendants { "with descendants" } else { "no descendants" },
                        if item.include_mapped { "with mapped" } else { "no mapped" },
                        if item.is_excluded { " [EXCLUDED]" } else { "" },
                    );
                }
                if expression.len() > CONCEPT_PREVIEW {
                    let _ = write!(
                        text,
                        "\n  ... and {} more concepts",
                        expression.len() - CONCEPT_PREVIEW
                    );
                }
            }
            _ => text.push_str("\n\nNo concept expression found"),
        }

        Ok(ToolText::single(text))
    }
}

fn build_expression(
    concepts: Vec<Concept>,
    include_descendants: bool,
    include_mapped: bool,
) -> ConceptSetExpression {
    ConceptSetExpression::from_items(concepts.into_iter().map(|concept| {
        ConceptSetItem::new(concept)
            .with_descendants(include_descendants)
            .with_mapped(include_mapped)
    }))
}

fn push_concept_set_json(text: &mut String, concept_set: &ConceptSet) {
    match serde_json::to_string_pretty(concept_set) {
        Ok(json) => {
            let _ = write!(text, "\n\nConcept Set JSON:\n{json}");
        }
        Err(err) => {
            let _ = write!(text, "\n\nConcept Set JSON unavailable: {err}");
        }
    }
}
