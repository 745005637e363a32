//! Identity resolution driver
//!
//! Maps a free-form phone-or-email string to customer identities by running
//! an ordered list of [`ResolutionStrategy`] implementations. Strategies
//! trade latency against completeness (local cache first, live API later);
//! each is independently fallible without aborting the overall resolution.

use std::sync::Arc;

use async_trait::async_trait;
use fieldsync_domain::{ContactType, Result};
use tracing::{debug, warn};

use crate::contact::{normalize_email, normalize_phone};

/// A normalized lookup key classified as phone or email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactKey {
    Email(String),
    Phone(String),
}

impl ContactKey {
    /// Classify and normalize a free-form identifier.
    ///
    /// Anything containing `@` is treated as an email; everything else as a
    /// phone number. Returns `None` when nothing usable remains after
    /// normalization.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.contains('@') {
            Some(Self::Email(normalize_email(trimmed)))
        } else {
            let digits = normalize_phone(trimmed);
            if digits.is_empty() {
                None
            } else {
                Some(Self::Phone(digits))
            }
        }
    }

    pub fn normalized(&self) -> &str {
        match self {
            Self::Email(v) | Self::Phone(v) => v,
        }
    }

    pub fn contact_type(&self) -> ContactType {
        match self {
            Self::Email(_) => ContactType::Email,
            Self::Phone(_) => ContactType::Phone,
        }
    }
}

/// One way of resolving a contact key to candidate customer ids.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Short name used in logs when a strategy is skipped.
    fn name(&self) -> &'static str;

    /// Return candidate customer ids for the key, in match order.
    /// An empty vector means "no match here, try the next strategy".
    async fn try_resolve(&self, key: &ContactKey) -> Result<Vec<String>>;
}

/// Driver iterating strategies in order until one yields candidates.
pub struct CustomerIdentityResolver {
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
}

impl CustomerIdentityResolver {
    pub fn new(strategies: Vec<Arc<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve a free-form identifier to zero, one, or many customer ids.
    ///
    /// A failing strategy is logged and skipped; exhaustion yields an empty
    /// vector, never an error. Duplicate ids are removed preserving the
    /// order in which the winning strategy returned them.
    pub async fn resolve(&self, identifier: &str) -> Vec<String> {
        let Some(key) = ContactKey::parse(identifier) else {
            debug!(identifier, "identifier empty after normalization");
            return Vec::new();
        };

        for strategy in &self.strategies {
            match strategy.try_resolve(&key).await {
                Ok(ids) if !ids.is_empty() => {
                    debug!(strategy = strategy.name(), count = ids.len(), "resolved candidates");
                    return dedup_preserving_order(ids);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "resolution strategy failed, trying next"
                    );
                    continue;
                }
            }
        }

        Vec::new()
    }
}

/// Remove duplicate ids while keeping first-seen order.
pub fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
