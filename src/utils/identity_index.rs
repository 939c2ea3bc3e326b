//! Fast availability checks for the unique user fields.
//!
//! Cuckoo filter for fast negatives, moka cache for fast positives, the
//! repository as fallback. The store's unique constraints stay authoritative.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use autoscale_cuckoo_filter::CuckooFilter;
use moka::future::Cache;

use crate::db::{Page, Repository, StoreError};
use crate::model::user::{Identity, UniqueField};

/// Expected capacity and false-positive rate.
/// Tune these based on real user counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

pub struct IdentityIndex {
    filter: RwLock<CuckooFilter<String>>,
    /// keys known to be TAKEN
    taken: Cache<String, ()>,
}

#[inline]
fn key(field: UniqueField, value: &str) -> String {
    format!("{}:{}", field, field.normalize(value))
}

impl Default for IdentityIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
            taken: Cache::builder()
                .max_capacity(500_000)
                .time_to_live(Duration::from_secs(86400)) // 24h TTL
                .build(),
        }
    }

    /// False positives possible, false negatives not.
    pub fn might_exist(&self, field: UniqueField, value: &str) -> bool {
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key(field, value))
    }

    /// Records every unique field of a persisted user.
    pub async fn insert(&self, identity: &Identity) {
        let keys: Vec<String> = UniqueField::ALL
            .iter()
            .map(|f| key(*f, &f.value_of(identity)))
            .collect();

        {
            let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);
            for k in &keys {
                filter.add(k);
            }
        }

        futures::future::join_all(keys.into_iter().map(|k| self.taken.insert(k, ()))).await;
    }

    /// true  => value AVAILABLE
    /// false => value TAKEN
    pub async fn is_available(
        &self,
        repo: &dyn Repository,
        field: UniqueField,
        value: &str,
    ) -> Result<bool, StoreError> {
        if !self.might_exist(field, value) {
            return Ok(true);
        }

        let k = key(field, value);
        if self.taken.get(&k).await.is_some() {
            return Ok(false);
        }

        let taken = repo.identity_taken(field, &field.normalize(value)).await?;
        if taken {
            self.taken.insert(k, ()).await;
        }
        Ok(!taken)
    }

    /// Loads every stored identity in batches of `batch_size`.
    pub async fn warmup(&self, repo: &dyn Repository, batch_size: usize) -> Result<usize, StoreError> {
        let batch_size = batch_size.max(1) as u64;
        let mut offset = 0u64;
        let mut total = 0usize;

        loop {
            let batch = repo
                .identities(Page {
                    limit: batch_size,
                    offset,
                })
                .await?;

            for identity in &batch {
                self.insert(identity).await;
            }
            total += batch.len();

            if (batch.len() as u64) < batch_size {
                break;
            }
            offset += batch_size;
        }

        log::info!("Identity index warmup complete: {} users", total);
        Ok(total)
    }
}
