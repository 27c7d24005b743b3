//! DuckDB Data Layer
//!
//! The only component that touches the warehouse connection. Catalog results
//! are enriched with semantic manifest lookups before they leave this module.

use crate::error::{AstroError, Result};
use crate::execution::result::{value_to_json, QueryOutcome, QueryResult, SampleResult};
use crate::semantic::{EntityMeta, EntityType, SemanticManifest, SemanticRole};
use duckdb::types::Value;
use duckdb::{params, AccessMode, Config, Connection};
use serde::Serialize;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum rows returned by `execute_query`.
pub const QUERY_ROW_CAP: usize = 100;
/// Maximum rows returned by `sample_data`.
pub const SAMPLE_ROW_CAP: i64 = 10;
pub const DEFAULT_SAMPLE_ROWS: i64 = 5;

const METRIC_PREVIEW: usize = 5;
const ENTITY_PREVIEW: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaInfo {
    pub schema: String,
    pub entity_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

/// Manifest data merged into a `list_tables` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSemantics {
    pub entity: String,
    pub entity_type: EntityType,
    pub description: String,
    pub grain: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: String,
    /// `None` when the table could not be counted.
    pub row_count: Option<i64>,
    #[serde(flatten)]
    pub semantics: Option<TableSemantics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<SemanticRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Result of `describe_table`: a bare column list, or the same list wrapped in
/// entity metadata when the table is known to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableDescription {
    Columns(Vec<ColumnInfo>),
    Entity {
        entity: String,
        entity_type: EntityType,
        description: String,
        grain: String,
        primary_key: Option<String>,
        columns: Vec<ColumnInfo>,
    },
}

impl TableDescription {
    pub fn columns(&self) -> &[ColumnInfo] {
        match self {
            TableDescription::Columns(columns) => columns,
            TableDescription::Entity { columns, .. } => columns,
        }
    }
}

/// `[A-Za-z0-9_]+`
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read-only handle on the warehouse plus the manifest used to enrich it.
pub struct DataLayer {
    db_path: PathBuf,
    conn: Connection,
    manifest: Arc<SemanticManifest>,
}

impl DataLayer {
    /// Open `db_path` read-only. Fails if the file does not exist.
    pub fn open(db_path: impl AsRef<Path>, manifest: Arc<SemanticManifest>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if !db_path.exists() {
            return Err(AstroError::WarehouseNotFound(db_path));
        }
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(&db_path, config)?;
        info!("Opened warehouse {} (read-only)", db_path.display());
        Ok(Self {
            db_path,
            conn,
            manifest,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn manifest(&self) -> &SemanticManifest {
        &self.manifest
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| AstroError::DuckDb(e))
    }

    /// User schemas, each annotated with the manifest entities mapped into it.
    pub fn list_schemas(&self) -> Result<Vec<SchemaInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT schema_name
             FROM information_schema.schemata
             WHERE schema_name NOT IN ('information_schema', 'pg_catalog')
             ORDER BY schema_name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .map(|schema| {
                let entities = self.manifest.entities_in_schema(&schema);
                SchemaInfo {
                    entity_count: entities.len(),
                    entities: entities
                        .iter()
                        .take(ENTITY_PREVIEW)
                        .map(|e| e.name.clone())
                        .collect(),
                    schema,
                }
            })
            .collect())
    }

    /// Tables and views in `schema` with row counts and manifest context.
    pub fn list_tables(&self, schema: &str) -> Result<Vec<TableInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name, table_type
             FROM information_schema.tables
             WHERE table_schema = ?
             ORDER BY table_name",
        )?;
        let rows = stmt
            .query_map(params![schema], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(name, table_type)| {
                let row_count = self.count_rows(schema, &name);
                let semantics = self
                    .manifest
                    .entity_for_table(schema, &name)
                    .map(|entity| self.table_semantics(entity));
                TableInfo {
                    name,
                    table_type,
                    row_count,
                    semantics,
                }
            })
            .collect())
    }

    fn count_rows(&self, schema: &str, table: &str) -> Option<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_identifier(schema),
            quote_identifier(table)
        );
        match self.conn.query_row(&sql, [], |row| row.get::<_, i64>(0)) {
            Ok(count) => Some(count),
            Err(e) => {
                debug!("Could not count {}.{}: {}", schema, table, e);
                None
            }
        }
    }

    fn table_semantics(&self, entity: &EntityMeta) -> TableSemantics {
        TableSemantics {
            entity: entity.name.clone(),
            entity_type: entity.entity_type,
            description: entity.description.clone(),
            grain: entity.grain.clone(),
            metrics: self
                .manifest
                .metrics_for(&entity.name)
                .into_iter()
                .take(METRIC_PREVIEW)
                .map(|m| m.name.clone())
                .collect(),
            relationships: self
                .manifest
                .relationships_for(&entity.name)
                .into_iter()
                .map(|r| {
                    format!(
                        "{}.{} -> {}.{} ({})",
                        r.from_entity, r.from_column, r.to_entity, r.to_column, r.cardinality
                    )
                })
                .collect(),
        }
    }

    /// Columns of `schema.table` with physical type, nullability and any
    /// manifest annotations.
    pub fn describe_table(&self, schema: &str, table: &str) -> Result<TableDescription> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type, is_nullable
             FROM information_schema.columns
             WHERE table_schema = ? AND table_name = ?
             ORDER BY ordinal_position",
        )?;
        let physical = stmt
            .query_map(params![schema, table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let entity = self.manifest.entity_for_table(schema, table);
        let columns: Vec<ColumnInfo> = physical
            .into_iter()
            .map(|(column, data_type, is_nullable)| {
                let meta = entity.and_then(|e| e.column(&column));
                ColumnInfo {
                    nullable: is_nullable.eq_ignore_ascii_case("YES"),
                    semantic_type: meta.map(|m| m.semantic_role),
                    description: meta
                        .map(|m| m.description.clone())
                        .filter(|d| !d.is_empty()),
                    format: meta.and_then(|m| m.format.clone()),
                    column,
                    data_type,
                }
            })
            .collect();

        Ok(match entity {
            Some(e) => TableDescription::Entity {
                entity: e.name.clone(),
                entity_type: e.entity_type,
                description: e.description.clone(),
                grain: e.grain.clone(),
                primary_key: e.primary_key.clone(),
                columns,
            },
            None => TableDescription::Columns(columns),
        })
    }

    /// Up to 10 rows from `schema.table`. Both names must be plain identifiers.
    pub fn sample_data(&self, schema: &str, table: &str, limit: i64) -> Result<SampleResult> {
        let limit = limit.clamp(1, SAMPLE_ROW_CAP);
        if !is_valid_identifier(schema) || !is_valid_identifier(table) {
            return Err(AstroError::InvalidIdentifier(format!("{}.{}", schema, table)));
        }

        let sql = format!("SELECT * FROM \"{}\".\"{}\" LIMIT {}", schema, table, limit);
        let (columns, rows, _) = self.run(&sql, limit as usize)?;
        Ok(SampleResult { columns, rows })
    }

    /// Run arbitrary SQL. Rows are capped at 100 while `row_count` keeps the
    /// full size. Any failure comes back as `QueryOutcome::Failed`.
    pub fn execute_query(&self, sql: &str) -> QueryOutcome {
        let sql = sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        match self.run(sql, QUERY_ROW_CAP) {
            Ok((columns, rows, total)) => {
                let truncated = total > QUERY_ROW_CAP;
                QueryOutcome::Rows(QueryResult {
                    columns,
                    rows,
                    row_count: total,
                    truncated,
                    note: truncated.then(|| {
                        format!(
                            "Showing {} of {} rows. Refine your query for full results.",
                            QUERY_ROW_CAP, total
                        )
                    }),
                })
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                QueryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Execute `sql`, serializing at most `cap` rows while counting all of them.
    fn run(&self, sql: &str, cap: usize) -> Result<(Vec<String>, Vec<Vec<Json>>, usize)> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let columns = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();

        let mut kept = Vec::new();
        let mut total = 0usize;
        while let Some(row) = rows.next()? {
            if total < cap {
                let mut values = Vec::with_capacity(columns.len());
                for idx in 0..columns.len() {
                    values.push(value_to_json(row.get::<_, Value>(idx)?));
                }
                kept.push(values);
            }
            total += 1;
        }
        Ok((columns, kept, total))
    }
}
