//! Per-project label map
//!
//! Raw annotation label → display label, stored as one JSON object per
//! project and always read or replaced as a whole.

use fpx_common::config::RootLayout;
use fpx_common::Result;
use std::collections::BTreeMap;
use tracing::debug;

pub type LabelMap = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct LabelMapStore {
    layout: RootLayout,
}

impl LabelMapStore {
    pub fn new(layout: RootLayout) -> Self {
        Self { layout }
    }

    /// Stored map, empty if none was saved
    pub async fn get(&self, project_id: i64) -> Result<LabelMap> {
        let path = self.layout.label_map_path(project_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LabelMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored map
    pub async fn replace(&self, project_id: i64, map: &LabelMap) -> Result<()> {
        let path = self.layout.label_map_path(project_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(map)?;
        tokio::fs::write(&path, json).await?;
        debug!(project_id, entries = map.len(), "Label map saved");
        Ok(())
    }
}
