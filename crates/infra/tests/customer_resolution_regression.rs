//! Identity resolution against a real database.
//!
//! Exercises the cache-aside path end to end: local hits short-circuit the
//! platform entirely, and live hits are written back so the next lookup is
//! served locally.

mod support;

use std::sync::Arc;

use fieldsync_core::CustomerStore;
use fieldsync_domain::{ContactType, Customer, CustomerContact};
use fieldsync_infra::database::SqliteCustomerRepository;
use fieldsync_infra::sync::CustomerResolutionService;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{test_client, TestDatabase};

fn customer(id: &str, name: &str) -> Customer {
    Customer {
        external_id: id.to_string(),
        name: name.to_string(),
        customer_type: Some("Residential".to_string()),
        street: None,
        city: None,
        state: None,
        postal_code: None,
        active: true,
        balance: 0,
        job_count: 0,
        lifetime_value: 0,
        last_synced_at: 1_700_000_000,
    }
}

fn phone_contact(customer_id: &str, raw: &str, normalized: &str) -> CustomerContact {
    CustomerContact {
        customer_id: customer_id.to_string(),
        contact_type: ContactType::Phone,
        raw_value: raw.to_string(),
        normalized_value: normalized.to_string(),
        is_primary: true,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_phone_resolves_to_every_owner() {
    let db = TestDatabase::new();
    let repo = Arc::new(SqliteCustomerRepository::new(db.manager.clone()));

    repo.upsert_customer(&customer("c1", "Alice")).await.expect("upsert c1");
    repo.upsert_customer(&customer("c2", "Bob")).await.expect("upsert c2");
    repo.replace_contacts("c1", &[phone_contact("c1", "(512) 555-1234", "5125551234")])
        .await
        .expect("contacts c1");
    repo.replace_contacts("c2", &[phone_contact("c2", "+1 512 555 1234", "5125551234")])
        .await
        .expect("contacts c2");

    // No mocks mounted: a local hit must never reach the platform.
    let server = MockServer::start().await;
    let service = CustomerResolutionService::new(test_client(&server.uri()), repo);

    let ids = service.resolve_customer("512.555.1234").await;
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"c1".to_string()));
    assert!(ids.contains(&"c2".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn live_hit_is_cached_for_the_next_lookup() {
    let db = TestDatabase::new();
    let repo = Arc::new(SqliteCustomerRepository::new(db.manager.clone()));
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/customers"))
        .and(query_param("email", "jane@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c9", "name": "Jane Doe", "type": "Residential", "active": true}],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/customers/c9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c9", "name": "Jane Doe", "type": "Residential", "active": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tenant/tenant-1/customers/c9/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "ct1",
                "customerId": "c9",
                "type": "Phone",
                "value": "(512) 555-9999",
                "isPrimary": true
            }],
            "hasMore": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = CustomerResolutionService::new(test_client(&server.uri()), repo.clone());

    let found = service.search_customer_with_fallback("Jane@Example.com ").await;
    assert_eq!(found.as_deref(), Some("c9"));

    // The write-back persisted the customer plus both the platform contact
    // and the searched email.
    let cached = repo.get_customer("c9").await.expect("lookup").expect("cached row");
    assert_eq!(cached.name, "Jane Doe");

    let by_email = repo
        .find_customer_ids_by_contact(ContactType::Email, "jane@example.com")
        .await
        .expect("email lookup");
    assert_eq!(by_email, vec!["c9".to_string()]);
    let by_phone = repo
        .find_customer_ids_by_contact(ContactType::Phone, "5125559999")
        .await
        .expect("phone lookup");
    assert_eq!(by_phone, vec!["c9".to_string()]);

    // Second resolution is served from the cache; the mock budgets above
    // (expect(1)) would fail the test if the platform were hit again.
    let ids = service.resolve_customer("jane@example.com").await;
    assert_eq!(ids, vec!["c9".to_string()]);
}
