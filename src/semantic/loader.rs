//! Semantic Manifest Loader
//!
//! Loads the manifest from its YAML document. Loading is strict: a record
//! missing a required key, or an enum value outside the known vocabulary,
//! fails the whole load.

use crate::error::{AstroError, Result};
use crate::semantic::manifest::{
    Cardinality, ColumnMeta, EntityMeta, EntityType, Metric, Relationship, SemanticManifest,
    SemanticRole, SuggestedAnalysis,
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// YAML representation of a manifest column
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnYaml {
    pub name: String,
    #[serde(default)]
    pub semantic_type: SemanticRole,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// YAML representation of an entity
#[derive(Debug, Clone, Deserialize)]
pub struct EntityYaml {
    pub name: String,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub grain: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub columns: Vec<ColumnYaml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipYaml {
    pub name: String,
    pub from_entity: String,
    pub from_column: String,
    pub to_entity: String,
    pub to_column: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricYaml {
    pub name: String,
    pub entity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestedAnalysisYaml {
    pub question: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

/// Top-level manifest document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestYaml {
    #[serde(default)]
    pub entities: Vec<EntityYaml>,
    #[serde(default)]
    pub relationships: Vec<RelationshipYaml>,
    #[serde(default)]
    pub metrics: Vec<MetricYaml>,
    #[serde(default)]
    pub suggested_analyses: Vec<SuggestedAnalysisYaml>,
}

/// Load a manifest from YAML text
pub fn load_from_yaml(yaml: &str) -> Result<SemanticManifest> {
    // An empty document is a manifest with nothing in it.
    let doc: ManifestYaml = if yaml.trim().is_empty() {
        ManifestYaml::default()
    } else {
        serde_yaml::from_str(yaml)
            .map_err(|e| AstroError::Manifest(format!("Failed to parse manifest: {}", e)))?
    };

    let entities = doc
        .entities
        .into_iter()
        .map(|e| {
            let columns = e
                .columns
                .into_iter()
                .map(|c| ColumnMeta {
                    name: c.name,
                    semantic_role: c.semantic_type,
                    description: c.description,
                    format: c.format,
                })
                .collect::<Vec<_>>();
            ensure_unique_columns(&e.name, &columns)?;
            Ok(EntityMeta {
                name: e.name,
                schema: e.schema,
                table: e.table,
                description: e.description.trim().to_string(),
                grain: e.grain,
                primary_key: e.primary_key,
                entity_type: e.entity_type,
                columns,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let relationships = doc
        .relationships
        .into_iter()
        .map(|r| Relationship {
            name: r.name,
            from_entity: r.from_entity,
            from_column: r.from_column,
            to_entity: r.to_entity,
            to_column: r.to_column,
            cardinality: r.cardinality,
            description: r.description,
        })
        .collect();

    let metrics = doc
        .metrics
        .into_iter()
        .map(|m| Metric {
            name: m.name,
            entity: m.entity,
            description: m.description.trim().to_string(),
            sql: m.sql.trim().to_string(),
            format: m.format,
        })
        .collect();

    let analyses = doc
        .suggested_analyses
        .into_iter()
        .map(|a| SuggestedAnalysis {
            question: a.question,
            entities: a.entities,
            dimensions: a.dimensions,
            metrics: a.metrics,
        })
        .collect();

    SemanticManifest::new(entities, relationships, metrics, analyses)
}

/// Load a manifest from file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<SemanticManifest> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AstroError::Manifest(format!("Failed to read manifest {}: {}", path.display(), e))
    })?;
    let manifest = load_from_yaml(&contents)?;
    info!(
        "Loaded semantic manifest from {} ({} entities, {} relationships, {} metrics)",
        path.display(),
        manifest.entities().len(),
        manifest.relationships().len(),
        manifest.metrics().len()
    );
    Ok(manifest)
}

fn ensure_unique_columns(entity: &str, columns: &[ColumnMeta]) -> Result<()> {
    for (i, col) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.name == col.name) {
            return Err(AstroError::Manifest(format!(
                "entity '{}' declares column '{}' twice",
                entity, col.name
            )));
        }
    }
    Ok(())
}
