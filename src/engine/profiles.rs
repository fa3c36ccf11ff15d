use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::profile::UserProfile;
use crate::store::guarded::GuardedStore;
use crate::store::{CommitOutcome, DocPath, WriteBatch};

/// Read and write access to the `profiles` collection.
#[derive(Clone)]
pub struct ProfileDirectory {
    store: GuardedStore,
}

impl ProfileDirectory {
    pub fn new(store: GuardedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        let Some(snapshot) = self.store.get(&DocPath::profile(uid)).await? else {
            return Ok(None);
        };

        let mut profile: UserProfile = snapshot.decode()?;
        if profile.uid.is_empty() {
            profile.uid = uid.to_string();
        }
        Ok(Some(profile))
    }

    pub async fn save(&self, profile: &UserProfile) -> Result<(), AppError> {
        if profile.uid.trim().is_empty() {
            return Err(AppError::Validation("profile uid cannot be empty".to_string()));
        }

        let value = serde_json::to_value(profile)
            .map_err(|err| AppError::Internal(format!("failed to encode profile: {err}")))?;
        self.store.set(&DocPath::profile(&profile.uid), value).await?;

        info!(uid = %profile.uid, "profile saved");
        Ok(())
    }

    /// Overwrites the given fields of an existing profile. The `uid` field
    /// itself cannot be changed.
    ///
    /// The merged document must still decode as a [`UserProfile`]; otherwise
    /// nothing is written and the call fails with `Validation`. The write is
    /// conditional on the version that was validated.
    pub async fn update(
        &self,
        uid: &str,
        mut fields: Map<String, Value>,
    ) -> Result<UserProfile, AppError> {
        fields.remove("uid");
        if fields.is_empty() {
            return Err(AppError::Validation("no profile fields to update".to_string()));
        }

        let path = DocPath::profile(uid);
        let max_attempts = self.store.policy().max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let snapshot = self
                .store
                .get(&path)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("profile {uid} not found")))?;

            let mut merged = match snapshot.data {
                Value::Object(existing) => existing,
                _ => Map::new(),
            };
            for (key, value) in &fields {
                merged.insert(key.clone(), value.clone());
            }

            let mut profile: UserProfile = serde_json::from_value(Value::Object(merged))
                .map_err(|err| AppError::Validation(format!("invalid profile fields: {err}")))?;
            if profile.uid.is_empty() {
                profile.uid = uid.to_string();
            }

            let batch =
                WriteBatch::new().merge(path.clone(), Some(snapshot.version), fields.clone());
            match self.store.commit(batch).await? {
                CommitOutcome::Committed => {
                    info!(uid, "profile updated");
                    return Ok(profile);
                }
                CommitOutcome::Conflict { .. } => {
                    debug!(uid, attempt, "profile changed during update; re-reading");
                }
            }
        }

        Err(AppError::Conflict(format!(
            "profile {uid} kept changing; gave up after {max_attempts} attempts"
        )))
    }
}
