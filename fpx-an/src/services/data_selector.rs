//! Data selection
//!
//! Resolves a validated [`Selection`] against the catalog. Any tag id that
//! does not belong to the project makes the result empty; an empty result is
//! never widened to the whole project.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::db::{DataCatalog, TaggedItem};
use crate::error::PipelineResult;
use crate::models::{DataItemRecord, Selection, TagFilter};

/// AND/OR predicate over one item's tags
pub fn matches_filter(item_tags: &[i64], filter: &TagFilter) -> bool {
    let all_and = filter.and_tags.iter().all(|t| item_tags.contains(t));
    let any_or = filter.or_tags.is_empty() || filter.or_tags.iter().any(|t| item_tags.contains(t));
    all_and && any_or
}

/// Items of a project selected by `selection`, ascending by id
pub async fn resolve_selection(
    catalog: &dyn DataCatalog,
    project_id: i64,
    selection: &Selection,
) -> PipelineResult<Vec<DataItemRecord>> {
    let items = catalog.project_items_with_tags(project_id).await?;

    let selected: Vec<DataItemRecord> = match selection {
        Selection::Ids(ids) => {
            let wanted: HashSet<i64> = ids.iter().copied().collect();
            let found: Vec<DataItemRecord> = items
                .into_iter()
                .filter(|t| wanted.contains(&t.item.id))
                .map(|t| t.item)
                .collect();
            if found.len() < wanted.len() {
                warn!(
                    project_id,
                    requested = wanted.len(),
                    found = found.len(),
                    "Some requested data items are not in the project"
                );
            }
            found
        }
        Selection::Tags(filter) => {
            let project_tags: HashSet<i64> =
                catalog.project_tag_ids(project_id).await?.into_iter().collect();
            if let Some(foreign) = filter.tags_used().into_iter().find(|t| !project_tags.contains(t)) {
                warn!(project_id, tag_id = foreign, "Tag does not belong to project");
                return Ok(Vec::new());
            }
            items
                .into_iter()
                .filter(|TaggedItem { tag_ids, .. }| matches_filter(tag_ids, filter))
                .map(|t| t.item)
                .collect()
        }
    };

    debug!(project_id, count = selected.len(), "Resolved data selection");
    Ok(selected)
}
