//! # Idempotent Upsert
//!
//! Get-or-create-or-replace for derived objects with a deterministic
//! identity. Repeated runs against an up-to-date object perform no write.
//! Concurrent creators, writers and deleters are absorbed by retrying the
//! whole cycle.

use crate::store::{display_key, ResourceStore, StoreError, StoreResource};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, warn};

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converge the stored object towards `desired`
///
/// `mutate` copies the fields this operator owns from `desired` onto the
/// stored object. Fields owned by others survive. The replace carries the
/// `resourceVersion` of the read, so an intervening write causes a conflict
/// and another cycle instead of a lost update. An object deleted between the
/// read and the replace is recreated by the next cycle.
pub async fn create_or_update<S, K, F>(
    store: &S,
    desired: &K,
    mutate: F,
    max_attempts: u32,
) -> Result<UpsertOutcome, StoreError>
where
    S: ResourceStore,
    K: StoreResource + PartialEq,
    F: Fn(&mut K, &K),
{
    let key = display_key(desired);
    let namespace = desired.namespace();
    let name = desired.name_any();
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = match store.get::<K>(namespace.as_deref(), &name).await? {
            None => store.create(desired).await.map(|_| UpsertOutcome::Created),
            Some(existing) => {
                let mut updated = existing.clone();
                mutate(&mut updated, desired);
                if updated == existing {
                    debug!(object = %key, "object already up to date");
                    Ok(UpsertOutcome::Unchanged)
                } else {
                    store.replace(&updated).await.map(|_| UpsertOutcome::Updated)
                }
            }
        };

        match result {
            Err(e) if is_retryable(&e) && attempt < max_attempts => {
                warn!(
                    object = %key,
                    attempt,
                    max_attempts,
                    error = %e,
                    "concurrent write detected, retrying upsert"
                );
            }
            other => return other,
        }
    }
}

fn is_retryable(error: &StoreError) -> bool {
    error.is_conflict() || error.is_already_exists() || error.is_not_found()
}

/// Copy the fields of a Secret this operator owns
///
/// Owned label keys are set, other labels are kept. Data and type are
/// replaced wholesale.
pub fn copy_secret_owned_fields(target: &mut Secret, desired: &Secret) {
    if let Some(labels) = desired.metadata.labels.as_ref() {
        let target_labels = target.metadata.labels.get_or_insert_with(Default::default);
        for (key, value) in labels {
            target_labels.insert(key.clone(), value.clone());
        }
    }
    target.data.clone_from(&desired.data);
    target.type_.clone_from(&desired.type_);
}
