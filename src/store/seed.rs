use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::AppError;
use crate::store::{Collection, DocPath, DocumentStore};

/// Initial store contents, shaped like an export of the three collections.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Seed {
    pub orders: BTreeMap<String, Value>,
    pub profiles: BTreeMap<String, Value>,
    pub delivery_stats: BTreeMap<String, Value>,
}

impl Seed {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|err| AppError::Internal(format!("invalid seed: {err}")))
    }

    pub fn len(&self) -> usize {
        self.orders.len() + self.profiles.len() + self.delivery_stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes every seeded document and returns how many were written.
    pub async fn apply(self, store: &dyn DocumentStore) -> Result<usize, AppError> {
        let total = self.len();
        let groups = [
            (Collection::Orders, self.orders),
            (Collection::Profiles, self.profiles),
            (Collection::DeliveryStats, self.delivery_stats),
        ];

        for (collection, documents) in groups {
            for (id, value) in documents {
                store.set(&DocPath::new(collection, id), value).await?;
            }
        }

        Ok(total)
    }
}

pub async fn load_seed_file(store: &dyn DocumentStore, path: &Path) -> Result<usize, AppError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::Internal(format!("failed to read seed file {}: {err}", path.display()))
    })?;

    let written = Seed::parse(&raw)?.apply(store).await?;
    info!(path = %path.display(), documents = written, "store seeded");
    Ok(written)
}
