//! Full customer sync.
//!
//! Crawls every customer page by page, enriches each active customer with a
//! completed-job count, and mirrors the row plus its whole contact set into
//! the local store. One customer failing is logged and skipped; the crawl
//! continues (record-level isolation, no retry).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use fieldsync_core::{normalize_email, normalize_phone, CustomerStore, HeartbeatSink};
use fieldsync_domain::constants::{CUSTOMER_PAGE_SIZE, JOB_COUNT_MAX_PAGES};
use fieldsync_domain::{ContactType, Customer, CustomerContact, Result, SyncReport};
use tracing::{info, instrument, warn};

use crate::integrations::fsm::types::{to_minor_units, ApiContact, ApiCustomer};
use crate::integrations::fsm::FsmClient;

/// Full-crawl customer sync engine.
pub struct CustomerSyncEngine {
    client: Arc<FsmClient>,
    customers: Arc<dyn CustomerStore>,
    heartbeat: Arc<dyn HeartbeatSink>,
}

impl CustomerSyncEngine {
    pub fn new(
        client: Arc<FsmClient>,
        customers: Arc<dyn CustomerStore>,
        heartbeat: Arc<dyn HeartbeatSink>,
    ) -> Self {
        Self { client, customers, heartbeat }
    }

    /// Crawl all customers and mirror active ones into the local store.
    ///
    /// Pages are fetched strictly sequentially. The heartbeat fires once per
    /// page so an external watchdog does not flag a long crawl as stuck.
    #[instrument(skip(self))]
    pub async fn sync_all_customers(&self) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();
        let mut page = 1;

        loop {
            let envelope = self.client.customers_page(page, CUSTOMER_PAGE_SIZE).await?;
            self.heartbeat.beat();

            for customer in &envelope.data {
                if !customer.active {
                    continue;
                }

                match self.sync_one_customer(customer).await {
                    Ok(()) => report.records_processed += 1,
                    Err(e) => {
                        warn!(customer_id = %customer.id, error = %e, "customer sync failed, skipping");
                        report.errors.push(format!("{}: {}", customer.id, e));
                    }
                }
            }

            if !envelope.has_more {
                break;
            }
            page += 1;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = report.records_processed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "customer sync completed"
        );

        Ok(report)
    }

    async fn sync_one_customer(&self, api_customer: &ApiCustomer) -> Result<()> {
        let job_count = self.count_completed_jobs(&api_customer.id).await?;
        let now = chrono::Utc::now().timestamp();

        let customer = to_domain_customer(api_customer, job_count, now);
        self.customers.upsert_customer(&customer).await?;

        let api_contacts = self.client.get_customer_contacts(&api_customer.id).await?;
        let contacts = to_domain_contacts(&api_customer.id, &api_contacts);
        self.customers.replace_contacts(&api_customer.id, &contacts).await?;

        Ok(())
    }

    /// Count a customer's completed jobs via a paginated sub-fetch, capped as
    /// a safety valve against pathological accounts.
    async fn count_completed_jobs(&self, customer_id: &str) -> Result<i64> {
        let mut count = 0_i64;
        let mut page = 1;

        loop {
            let envelope = self.client.completed_jobs_page(customer_id, page).await?;
            count += envelope.data.len() as i64;

            if !envelope.has_more {
                break;
            }
            if page >= JOB_COUNT_MAX_PAGES {
                warn!(customer_id, pages = page, "completed-job count hit page cap, truncating");
                break;
            }
            page += 1;
        }

        Ok(count)
    }
}

/// Convert a wire customer into the local row shape.
pub(crate) fn to_domain_customer(api: &ApiCustomer, job_count: i64, now: i64) -> Customer {
    let address = api.address.as_ref();

    Customer {
        external_id: api.id.clone(),
        name: api.name.clone(),
        customer_type: api.customer_type.clone(),
        street: address.and_then(|a| a.street.clone()),
        city: address.and_then(|a| a.city.clone()),
        state: address.and_then(|a| a.state.clone()),
        postal_code: address.and_then(|a| a.zip.clone()),
        active: api.active,
        balance: to_minor_units(api.balance),
        job_count,
        lifetime_value: to_minor_units(api.lifetime_value),
        last_synced_at: now,
    }
}

/// Normalize wire contacts into local rows. Contacts with an unrecognized
/// type or an empty normalized value are dropped.
pub(crate) fn to_domain_contacts(
    customer_id: &str,
    api_contacts: &[ApiContact],
) -> Vec<CustomerContact> {
    api_contacts
        .iter()
        .filter_map(|contact| {
            let contact_type = match ContactType::from_str(&contact.contact_type) {
                Ok(t) => t,
                Err(_) => {
                    warn!(
                        customer_id,
                        contact_type = %contact.contact_type,
                        "skipping contact with unrecognized type"
                    );
                    return None;
                }
            };

            let normalized = match contact_type {
                ContactType::Phone => normalize_phone(&contact.value),
                ContactType::Email => normalize_email(&contact.value),
            };
            if normalized.is_empty() {
                return None;
            }

            Some(CustomerContact {
                customer_id: customer_id.to_string(),
                contact_type,
                raw_value: contact.value.clone(),
                normalized_value: normalized,
                is_primary: contact.is_primary,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fieldsync_domain::FieldSyncError;
    use tokio::sync::Mutex as TokioMutex;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct NoopHeartbeat;

    impl HeartbeatSink for NoopHeartbeat {
        fn beat(&self) {}
    }

    #[derive(Default)]
    struct RecordingCustomerStore {
        upserts: TokioMutex<Vec<Customer>>,
        contact_sets: TokioMutex<Vec<(String, Vec<CustomerContact>)>>,
    }

    #[async_trait]
    impl CustomerStore for RecordingCustomerStore {
        async fn upsert_customer(&self, customer: &Customer) -> Result<()> {
            self.upserts.lock().await.push(customer.clone());
            Ok(())
        }

        async fn replace_contacts(
            &self,
            customer_id: &str,
            contacts: &[CustomerContact],
        ) -> Result<()> {
            self.contact_sets.lock().await.push((customer_id.to_string(), contacts.to_vec()));
            Ok(())
        }

        async fn find_customer_ids_by_contact(
            &self,
            _contact_type: ContactType,
            _normalized_value: &str,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn get_customer(&self, _external_id: &str) -> Result<Option<Customer>> {
            Err(FieldSyncError::Internal("not used".into()))
        }
    }

    fn engine_for(
        server: &MockServer,
        store: Arc<RecordingCustomerStore>,
    ) -> CustomerSyncEngine {
        let config = fieldsync_domain::PlatformConfig {
            base_url: server.uri(),
            auth_url: format!("{}/oauth/token", server.uri()),
            client_id: "id".into(),
            client_secret: "secret".into(),
            tenant_id: "tenant-1".into(),
            app_key: "key".into(),
        };

        struct StaticToken;
        #[async_trait]
        impl crate::integrations::fsm::AccessTokenProvider for StaticToken {
            async fn access_token(&self) -> Result<String> {
                Ok("test-token".into())
            }
        }

        let client =
            Arc::new(FsmClient::new(&config, Arc::new(StaticToken)).expect("client built"));
        CustomerSyncEngine::new(client, store, Arc::new(NoopHeartbeat))
    }

    fn customer_json(id: &str, active: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("Customer {id}"),
            "type": "Residential",
            "active": active,
            "balance": 10.0,
            "lifetimeValue": 250.0
        })
    }

    fn empty_jobs_mock(customer_id: &str) -> Mock {
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/jobs"))
            .and(query_param("customerId", customer_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [],
                "hasMore": false
            })))
    }

    #[tokio::test]
    async fn skips_inactive_customers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [customer_json("c1", true), customer_json("c2", false)],
                "hasMore": false
            })))
            .mount(&server)
            .await;
        empty_jobs_mock("c1").mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers/c1/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "ct1", "type": "Phone", "value": "512-555-1234"}]
            })))
            .mount(&server)
            .await;

        let store = Arc::new(RecordingCustomerStore::default());
        let engine = engine_for(&server, Arc::clone(&store));

        let report = engine.sync_all_customers().await.expect("sync");
        assert_eq!(report.records_processed, 1);
        assert!(report.errors.is_empty());

        let upserts = store.upserts.lock().await;
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].external_id, "c1");
        assert_eq!(upserts[0].balance, 1000);

        let contact_sets = store.contact_sets.lock().await;
        assert_eq!(contact_sets[0].1[0].normalized_value, "5125551234");
    }

    #[tokio::test]
    async fn one_failing_customer_does_not_abort_the_run() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [customer_json("c-bad", true), customer_json("c-good", true)],
                "hasMore": false
            })))
            .mount(&server)
            .await;

        // The completed-jobs sub-fetch fails for the first customer only.
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/jobs"))
            .and(query_param("customerId", "c-bad"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        empty_jobs_mock("c-good").mount(&server).await;
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers/c-good/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let store = Arc::new(RecordingCustomerStore::default());
        let engine = engine_for(&server, Arc::clone(&store));

        let report = engine.sync_all_customers().await.expect("sync");
        assert_eq!(report.records_processed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("c-bad:"));

        let upserts = store.upserts.lock().await;
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].external_id, "c-good");
    }

    #[tokio::test]
    async fn accumulates_job_count_across_pages() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [customer_json("c1", true)],
                "hasMore": false
            })))
            .mount(&server)
            .await;

        let job = serde_json::json!({
            "id": "j", "jobNumber": "1", "customerId": "c1", "status": "Completed",
            "completedOn": "2024-05-01T12:00:00Z", "total": 1.0,
            "createdOn": "2024-04-01T09:00:00Z", "modifiedOn": "2024-05-01T12:00:00Z"
        });
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/jobs"))
            .and(query_param("customerId", "c1"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [job.clone(), job.clone(), job.clone()],
                "hasMore": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/jobs"))
            .and(query_param("customerId", "c1"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [job.clone(), job.clone()],
                "hasMore": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tenant/tenant-1/customers/c1/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let store = Arc::new(RecordingCustomerStore::default());
        let engine = engine_for(&server, Arc::clone(&store));

        engine.sync_all_customers().await.expect("sync");
        assert_eq!(store.upserts.lock().await[0].job_count, 5);
    }

    #[test]
    fn contacts_with_unknown_types_are_dropped() {
        let api_contacts = vec![
            ApiContact {
                id: "ct1".into(),
                customer_id: None,
                contact_type: "Fax".into(),
                value: "512-555-0000".into(),
                is_primary: false,
            },
            ApiContact {
                id: "ct2".into(),
                customer_id: None,
                contact_type: "Email".into(),
                value: " Jane@Example.COM ".into(),
                is_primary: true,
            },
        ];

        let contacts = to_domain_contacts("c1", &api_contacts);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].normalized_value, "jane@example.com");
    }
}
