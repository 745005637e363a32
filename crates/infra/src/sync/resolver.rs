//! Live identity-resolution strategies and the cache-aside service.
//!
//! Strategy order trades latency against completeness: the indexed local
//! cache answers first, the platform's exact-filter endpoints next, and a
//! bounded brute-force scan is the last resort. Every strategy failure is
//! swallowed so resolution degrades to "not found" rather than erroring.

use std::sync::Arc;

use fieldsync_core::resolution::dedup_preserving_order;
use fieldsync_core::{
    normalize_phone, ContactKey, CustomerStore, ResolutionStrategy,
};
use fieldsync_domain::constants::{
    BRUTE_FORCE_MAX_PAGES, BRUTE_FORCE_PAGE_SIZE, CONTACT_FETCH_BATCH_SIZE,
};
use fieldsync_domain::{ContactType, CustomerContact, Result};
use tracing::{debug, instrument, warn};

use crate::integrations::fsm::FsmClient;
use crate::sync::customers::{to_domain_contacts, to_domain_customer};

/// Indexed lookup against locally mirrored contacts.
pub struct LocalCacheStrategy {
    store: Arc<dyn CustomerStore>,
}

impl LocalCacheStrategy {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ResolutionStrategy for LocalCacheStrategy {
    fn name(&self) -> &'static str {
        "local-cache"
    }

    async fn try_resolve(&self, key: &ContactKey) -> Result<Vec<String>> {
        self.store.find_customer_ids_by_contact(key.contact_type(), key.normalized()).await
    }
}

/// Direct external query.
///
/// Email uses the exact-filter endpoint; phone uses the contacts-search
/// endpoint, deduplicated to customer ids in the order the endpoint returned
/// them, each hydrated via a per-id fetch.
pub struct LiveSearchStrategy {
    client: Arc<FsmClient>,
}

impl LiveSearchStrategy {
    pub fn new(client: Arc<FsmClient>) -> Self {
        Self { client }
    }

    async fn search_phone(&self, normalized: &str) -> Result<Vec<String>> {
        let contacts = self.client.search_contacts(normalized).await?;
        let ids = dedup_preserving_order(
            contacts.into_iter().filter_map(|c| c.customer_id).collect(),
        );

        let mut confirmed = Vec::with_capacity(ids.len());
        for id in ids {
            match self.client.get_customer(&id).await {
                Ok(_) => confirmed.push(id),
                Err(e) => {
                    warn!(customer_id = %id, error = %e, "candidate hydration failed, dropping");
                }
            }
        }

        Ok(confirmed)
    }
}

#[async_trait::async_trait]
impl ResolutionStrategy for LiveSearchStrategy {
    fn name(&self) -> &'static str {
        "live-search"
    }

    async fn try_resolve(&self, key: &ContactKey) -> Result<Vec<String>> {
        match key {
            ContactKey::Email(email) => {
                let customers = self.client.find_customers_by_email(email).await?;
                Ok(customers.into_iter().map(|c| c.id).collect())
            }
            ContactKey::Phone(digits) => self.search_phone(digits).await,
        }
    }
}

/// First-match search cascading from exact filters to a bounded scan.
pub struct FsmCustomerSearch {
    client: Arc<FsmClient>,
}

impl FsmCustomerSearch {
    pub fn new(client: Arc<FsmClient>) -> Self {
        Self { client }
    }

    /// Find the first customer matching the email or phone.
    ///
    /// Cascade: exact email filter, then phone contacts-search, then a
    /// brute-force scan capped at 5 pages of 50 customers. Hitting the cap
    /// without a match collapses to "not found".
    #[instrument(skip(self))]
    pub async fn search_customer(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(email) = email {
            let customers = self.client.find_customers_by_email(email).await?;
            if let Some(customer) = customers.into_iter().next() {
                return Ok(Some(customer.id));
            }
        }

        let Some(phone) = phone else {
            return Ok(None);
        };
        let target = normalize_phone(phone);
        if target.is_empty() {
            return Ok(None);
        }

        let contacts = self.client.search_contacts(&target).await?;
        if let Some(id) = contacts.into_iter().find_map(|c| c.customer_id) {
            return Ok(Some(id));
        }

        self.brute_force_phone_scan(&target).await
    }

    async fn brute_force_phone_scan(&self, target: &str) -> Result<Option<String>> {
        for page in 1..=BRUTE_FORCE_MAX_PAGES {
            let envelope = self.client.customers_page(page, BRUTE_FORCE_PAGE_SIZE).await?;
            let ids: Vec<String> = envelope.data.into_iter().map(|c| c.id).collect();

            for chunk in ids.chunks(CONTACT_FETCH_BATCH_SIZE) {
                let fetches = chunk.iter().map(|id| self.client.get_customer_contacts(id));
                let results = futures::future::join_all(fetches).await;

                for (id, result) in chunk.iter().zip(results) {
                    let contacts = match result {
                        Ok(contacts) => contacts,
                        Err(e) => {
                            warn!(customer_id = %id, error = %e, "contact fetch failed during scan");
                            continue;
                        }
                    };

                    let matched = contacts.iter().any(|c| {
                        matches!(c.contact_type.parse::<ContactType>(), Ok(ContactType::Phone))
                            && normalize_phone(&c.value) == target
                    });
                    if matched {
                        debug!(customer_id = %id, page, "brute-force scan matched");
                        return Ok(Some(id.clone()));
                    }
                }
            }

            if !envelope.has_more {
                return Ok(None);
            }
        }

        warn!(pages = BRUTE_FORCE_MAX_PAGES, "brute-force scan hit page cap without a match");
        Ok(None)
    }
}

/// Cache-aside resolution facade for login and lead-matching consumers.
pub struct CustomerResolutionService {
    client: Arc<FsmClient>,
    store: Arc<dyn CustomerStore>,
    search: FsmCustomerSearch,
}

impl CustomerResolutionService {
    pub fn new(client: Arc<FsmClient>, store: Arc<dyn CustomerStore>) -> Self {
        let search = FsmCustomerSearch::new(Arc::clone(&client));
        Self { client, store, search }
    }

    /// Resolve an identifier to zero, one, or many customer ids via the
    /// ordered strategy chain (local cache, then live search).
    pub async fn resolve_customer(&self, identifier: &str) -> Vec<String> {
        let resolver = fieldsync_core::CustomerIdentityResolver::new(vec![
            Arc::new(LocalCacheStrategy::new(Arc::clone(&self.store))),
            Arc::new(LiveSearchStrategy::new(Arc::clone(&self.client))),
        ]);
        resolver.resolve(identifier).await
    }

    /// Resolve to a single customer, populating the local cache on a live
    /// hit. Never errors: total exhaustion or any API failure yields `None`
    /// and leaves the cache unmodified.
    #[instrument(skip(self))]
    pub async fn search_customer_with_fallback(&self, identifier: &str) -> Option<String> {
        let key = ContactKey::parse(identifier)?;

        match self.store.find_customer_ids_by_contact(key.contact_type(), key.normalized()).await
        {
            Ok(ids) if !ids.is_empty() => {
                debug!(identifier, "resolved from local cache");
                return ids.into_iter().next();
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "local cache lookup failed, falling through to live search");
            }
        }

        let (email, phone) = match &key {
            ContactKey::Email(v) => (Some(v.as_str()), None),
            ContactKey::Phone(v) => (None, Some(v.as_str())),
        };

        let customer_id = match self.search.search_customer(email, phone).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "live customer search failed");
                return None;
            }
        };

        if let Err(e) = self.cache_live_hit(&customer_id, &key).await {
            warn!(customer_id = %customer_id, error = %e, "cache write-back failed");
        }

        Some(customer_id)
    }

    /// Opportunistically mirror a live hit into the local cache: the
    /// customer row, its contacts, and the searched identifier itself.
    async fn cache_live_hit(&self, customer_id: &str, key: &ContactKey) -> Result<()> {
        let api_customer = self.client.get_customer(customer_id).await?;
        let now = chrono::Utc::now().timestamp();

        let customer = to_domain_customer(&api_customer, 0, now);
        self.store.upsert_customer(&customer).await?;

        let api_contacts = self.client.get_customer_contacts(customer_id).await?;
        let mut contacts = to_domain_contacts(customer_id, &api_contacts);

        let already_present = contacts.iter().any(|c| {
            c.contact_type == key.contact_type() && c.normalized_value == key.normalized()
        });
        if !already_present {
            contacts.push(CustomerContact {
                customer_id: customer_id.to_string(),
                contact_type: key.contact_type(),
                raw_value: key.normalized().to_string(),
                normalized_value: key.normalized().to_string(),
                is_primary: false,
            });
        }

        self.store.replace_contacts(customer_id, &contacts).await
    }
}
