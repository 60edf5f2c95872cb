//! Gate catalog loading from YAML overrides.
//!
//! The builtin catalog ships plans for all four project categories. A YAML
//! file keyed by category can replace any subset of them; categories the
//! file omits keep their builtin plan. The merged catalog must pass
//! structural validation before it is handed to the services.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::domain::models::{CategoryPlan, GateCatalog, ProjectCategory};

const ALL_CATEGORIES: [ProjectCategory; 4] = [
    ProjectCategory::Standard,
    ProjectCategory::MlAugmented,
    ProjectCategory::Hybrid,
    ProjectCategory::Enhancement,
];

/// Loader that layers per-category file overrides onto the builtin catalog.
pub struct CatalogLoader;

impl CatalogLoader {
    /// Load the catalog, applying overrides from `path` when one is
    /// configured.
    pub fn load(path: Option<&str>) -> Result<GateCatalog> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(GateCatalog::builtin()),
        }
    }

    /// Load catalog overrides from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<GateCatalog> {
        let path = path.as_ref();
        debug!("Loading catalog overrides from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read catalog file: {}", path.display()))?;

        Self::load_from_yaml(&content)
    }

    /// Merge YAML overrides, a map keyed by project category, over the
    /// builtin plans.
    pub fn load_from_yaml(yaml: &str) -> Result<GateCatalog> {
        let mut overrides: HashMap<ProjectCategory, CategoryPlan> =
            serde_yaml::from_str(yaml).context("Failed to parse catalog YAML")?;

        if overrides.is_empty() {
            return Ok(GateCatalog::builtin());
        }

        info!("Applying catalog overrides for {} categories", overrides.len());

        let builtin = GateCatalog::builtin();
        let mut plans = HashMap::new();
        for category in ALL_CATEGORIES {
            let plan = overrides
                .remove(&category)
                .or_else(|| builtin.plan(category).cloned());
            if let Some(plan) = plan {
                plans.insert(category, plan);
            }
        }

        let catalog = GateCatalog::new(plans);
        catalog
            .validate()
            .map_err(|reason| anyhow::anyhow!(reason))
            .context("Catalog validation failed")?;

        Ok(catalog)
    }
}
