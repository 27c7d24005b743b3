//! Semantic Manifest
//!
//! In-memory lookup structure over the declarative metadata document:
//! entities, relationships, metrics and suggested analyses. Built once,
//! read-only afterwards.

use crate::error::{AstroError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What a column means, independent of its physical type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    Key,
    #[default]
    Dimension,
    Measure,
    Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Fact,
    #[default]
    Dimension,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Fact => write!(f, "fact"),
            EntityType::Dimension => write!(f, "dimension"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    #[default]
    ManyToOne,
    ManyToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToOne => "many_to_one",
            Cardinality::ManyToMany => "many_to_many",
        };
        f.write_str(s)
    }
}

/// Semantic metadata for a single column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    pub semantic_role: SemanticRole,
    pub description: String,
    pub format: Option<String>,
}

/// Semantic metadata for a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMeta {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub description: String,
    /// What one row represents.
    pub grain: String,
    pub primary_key: Option<String>,
    pub entity_type: EntityType,
    /// Columns in manifest order; names are unique within an entity.
    pub columns: Vec<ColumnMeta>,
}

impl EntityMeta {
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_names_with_role(&self, role: SemanticRole) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.semantic_role == role)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// A foreign-key style link between two entities.
///
/// Endpoints are not checked against the entity list at load time; a dangling
/// endpoint simply never matches a lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub name: String,
    pub from_entity: String,
    pub from_column: String,
    pub to_entity: String,
    pub to_column: String,
    pub cardinality: Cardinality,
    pub description: String,
}

impl Relationship {
    pub fn involves(&self, entity_name: &str) -> bool {
        self.from_entity == entity_name || self.to_entity == entity_name
    }
}

/// A pre-defined calculation owned by one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub entity: String,
    pub description: String,
    pub sql: String,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedAnalysis {
    pub question: String,
    pub entities: Vec<String>,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub table: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: String,
    pub grain: String,
    pub dimensions: Vec<String>,
    pub measures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipSummary {
    pub name: String,
    pub from: String,
    pub to: String,
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub entity: String,
    pub description: String,
}

/// Digest of the whole manifest, shaped for use as model context.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    pub entities: Vec<EntitySummary>,
    pub relationships: Vec<RelationshipSummary>,
    pub metrics: Vec<MetricSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested_analyses: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SemanticManifest {
    entities: Vec<EntityMeta>,
    by_name: HashMap<String, usize>,
    by_table: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    metrics: Vec<Metric>,
    suggested_analyses: Vec<SuggestedAnalysis>,
}

impl SemanticManifest {
    /// Assemble a manifest and build its reverse indexes.
    ///
    /// Fails when two entities share a logical name or map onto the same
    /// `schema.table`.
    pub fn new(
        entities: Vec<EntityMeta>,
        relationships: Vec<Relationship>,
        metrics: Vec<Metric>,
        suggested_analyses: Vec<SuggestedAnalysis>,
    ) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(entities.len());
        let mut by_table = HashMap::with_capacity(entities.len());

        for (idx, entity) in entities.iter().enumerate() {
            if by_name.insert(entity.name.clone(), idx).is_some() {
                return Err(AstroError::Manifest(format!(
                    "duplicate entity name '{}'",
                    entity.name
                )));
            }
            if let Some(prev) = by_table.insert(entity.qualified_table(), idx) {
                return Err(AstroError::Manifest(format!(
                    "entities '{}' and '{}' both map to {}",
                    entities[prev].name,
                    entity.name,
                    entity.qualified_table()
                )));
            }
        }

        Ok(Self {
            entities,
            by_name,
            by_table,
            relationships,
            metrics,
            suggested_analyses,
        })
    }

    pub fn entities(&self) -> &[EntityMeta] {
        &self.entities
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn suggested_analyses(&self) -> &[SuggestedAnalysis] {
        &self.suggested_analyses
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMeta> {
        self.by_name.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn entity_for_table(&self, schema: &str, table: &str) -> Option<&EntityMeta> {
        self.by_table
            .get(&format!("{}.{}", schema, table))
            .map(|&idx| &self.entities[idx])
    }

    pub fn entities_in_schema(&self, schema: &str) -> Vec<&EntityMeta> {
        self.entities.iter().filter(|e| e.schema == schema).collect()
    }

    /// Relationships where `entity_name` is on either side.
    pub fn relationships_for(&self, entity_name: &str) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.involves(entity_name))
            .collect()
    }

    pub fn metrics_for(&self, entity_name: &str) -> Vec<&Metric> {
        self.metrics.iter().filter(|m| m.entity == entity_name).collect()
    }

    pub fn column_meta(&self, schema: &str, table: &str, column: &str) -> Option<&ColumnMeta> {
        self.entity_for_table(schema, table)
            .and_then(|e| e.column(column))
    }

    pub fn summary(&self) -> ManifestSummary {
        ManifestSummary {
            entities: self
                .entities
                .iter()
                .map(|e| EntitySummary {
                    name: e.name.clone(),
                    table: e.qualified_table(),
                    entity_type: e.entity_type,
                    description: e.description.clone(),
                    grain: e.grain.clone(),
                    dimensions: e.column_names_with_role(SemanticRole::Dimension),
                    measures: e.column_names_with_role(SemanticRole::Measure),
                })
                .collect(),
            relationships: self
                .relationships
                .iter()
                .map(|r| RelationshipSummary {
                    name: r.name.clone(),
                    from: format!("{}.{}", r.from_entity, r.from_column),
                    to: format!("{}.{}", r.to_entity, r.to_column),
                    cardinality: r.cardinality,
                })
                .collect(),
            metrics: self
                .metrics
                .iter()
                .map(|m| MetricSummary {
                    name: m.name.clone(),
                    entity: m.entity.clone(),
                    description: m.description.clone(),
                })
                .collect(),
            suggested_analyses: self
                .suggested_analyses
                .iter()
                .map(|a| a.question.clone())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty() && self.metrics.is_empty()
    }
}
