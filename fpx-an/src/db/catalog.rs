//! Data-item catalog
//!
//! The analysis core only reads the catalog: which files belong to a
//! project, and which tags each file carries. Seeding helpers exist for the
//! upload path and for tests.

use async_trait::async_trait;
use fpx_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use crate::models::DataItemRecord;

/// A catalog entry together with its tag ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedItem {
    pub item: DataItemRecord,
    pub tag_ids: Vec<i64>,
}

/// Read access to data items and tags
#[async_trait]
pub trait DataCatalog: Send + Sync {
    /// Every item of a project with its tags, ascending by id
    async fn project_items_with_tags(&self, project_id: i64) -> Result<Vec<TaggedItem>>;

    /// Ids of the tags defined in a project
    async fn project_tag_ids(&self, project_id: i64) -> Result<Vec<i64>>;

    async fn get_item(&self, item_id: i64) -> Result<Option<DataItemRecord>>;
}

/// SQLite-backed catalog
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register an uploaded file, returning its id
    pub async fn register_data_item(
        &self,
        project_id: i64,
        file_path: &str,
        data_type: Option<&str>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO data_items (project_id, file_path, data_type) VALUES (?, ?, ?)",
        )
        .bind(project_id)
        .bind(file_path)
        .bind(data_type)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn create_tag(&self, project_id: i64, name: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO tags (project_id, name) VALUES (?, ?)")
            .bind(project_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Attach a tag to an item; both must belong to the same project
    pub async fn tag_data_item(&self, data_item_id: i64, tag_id: i64) -> Result<()> {
        let same_project: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT d.id FROM data_items d
            JOIN tags t ON t.project_id = d.project_id
            WHERE d.id = ? AND t.id = ?
            "#,
        )
        .bind(data_item_id)
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;

        if same_project.is_none() {
            return Err(Error::InvalidInput(format!(
                "data item {} and tag {} are not in the same project",
                data_item_id, tag_id
            )));
        }

        sqlx::query("INSERT OR IGNORE INTO data_item_tags (data_item_id, tag_id) VALUES (?, ?)")
            .bind(data_item_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DataItemRecord> {
    Ok(DataItemRecord {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        file_path: row.try_get("file_path")?,
        data_type: row.try_get("data_type")?,
    })
}

#[async_trait]
impl DataCatalog for SqliteCatalog {
    async fn project_items_with_tags(&self, project_id: i64) -> Result<Vec<TaggedItem>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.project_id, d.file_path, d.data_type, dt.tag_id
            FROM data_items d
            LEFT JOIN data_item_tags dt ON dt.data_item_id = d.id
            WHERE d.project_id = ?
            ORDER BY d.id, dt.tag_id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut items: BTreeMap<i64, TaggedItem> = BTreeMap::new();
        for row in &rows {
            let record = record_from_row(row)?;
            let tag_id: Option<i64> = row.try_get("tag_id")?;
            let entry = items.entry(record.id).or_insert_with(|| TaggedItem {
                item: record,
                tag_ids: Vec::new(),
            });
            if let Some(tag_id) = tag_id {
                entry.tag_ids.push(tag_id);
            }
        }

        Ok(items.into_values().collect())
    }

    async fn project_tag_ids(&self, project_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE project_id = ? ORDER BY id")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn get_item(&self, item_id: i64) -> Result<Option<DataItemRecord>> {
        let row = sqlx::query(
            "SELECT id, project_id, file_path, data_type FROM data_items WHERE id = ?",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }
}
