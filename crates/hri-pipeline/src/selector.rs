//! Temporal image selection: the most recent cloud-free summer scene.

use hri_common::{Extent, MonthSet};
use sources::{ImageryCatalog, SceneMetadata};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StageContext};

/// Catalog filter for candidate scenes.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFilter {
    /// Cloud cover must be strictly below this fraction.
    pub max_cloud_cover: f64,
    pub months: MonthSet,
    /// Free-form where clause the catalog evaluates.
    pub predicate: Option<String>,
}

impl SceneFilter {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_cloud_cover: config.max_cloud_cover,
            months: config.months.clone(),
            predicate: config.scene_predicate.clone(),
        }
    }

    /// SQL where clause for the catalog query, e.g.
    /// `((Best < 2000000) OR (Name LIKE 'Ov%')) AND (CloudCover < 0.05) AND (Month = 7 OR Month = 8)`.
    pub fn where_clause(&self) -> String {
        let mut terms = Vec::with_capacity(3);
        if let Some(predicate) = self.predicate.as_deref().filter(|p| !p.trim().is_empty()) {
            terms.push(format!("({})", predicate));
        }
        terms.push(format!("(CloudCover < {})", self.max_cloud_cover));
        terms.push(self.months.to_where_clause("Month"));
        terms.join(" AND ")
    }

    /// Client-side check of the cloud and month terms. The predicate is
    /// only evaluated by the catalog.
    pub fn matches(&self, scene: &SceneMetadata) -> bool {
        scene.cloud_cover < self.max_cloud_cover && self.months.contains(scene.month())
    }
}

/// Pick the most recent scene passing `filter`.
///
/// Candidates are ordered by acquisition date, newest first; equal dates
/// keep catalog order.
pub fn select_latest(candidates: Vec<SceneMetadata>, filter: &SceneFilter) -> Result<SceneMetadata> {
    let total = candidates.len();
    let mut passing: Vec<SceneMetadata> = candidates.into_iter().filter(|s| filter.matches(s)).collect();

    if passing.len() < total {
        warn!(
            rejected = total - passing.len(),
            "Catalog returned scenes outside the filter"
        );
    }

    passing.sort_by(|a, b| b.acquisition_date.cmp(&a.acquisition_date));

    passing.into_iter().next().ok_or_else(|| {
        PipelineError::NoDataFound(format!(
            "no scene satisfies {} ({} candidates returned)",
            filter.where_clause(),
            total
        ))
    })
}

/// Query `catalog` for the extent and select the newest qualifying scene.
#[instrument(skip(catalog, extent, filter))]
pub async fn select_scene(
    catalog: &dyn ImageryCatalog,
    extent: &Extent,
    filter: &SceneFilter,
) -> Result<SceneMetadata> {
    let where_clause = filter.where_clause();
    debug!(where_clause = %where_clause, "Querying imagery catalog");

    let candidates = catalog
        .query_scenes(extent, &where_clause)
        .await
        .stage(Stage::ImageSelection)?;
    let scene = select_latest(candidates, filter)?;

    info!(
        scene_id = scene.object_id,
        name = %scene.name,
        acquired = %scene.acquisition_date,
        cloud_cover = scene.cloud_cover,
        "Selected scene"
    );
    Ok(scene)
}
