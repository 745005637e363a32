//! REST client for the field-service platform.
//!
//! Every outbound call to the platform goes through [`FsmClient::request_json`]:
//! it authenticates, attaches the bearer and application-key headers, buffers
//! the full response body (the platform streams chunked responses without a
//! length header, so partial reads are unsafe) and parses JSON, treating an
//! empty body as `{}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldsync_domain::constants::JOB_COUNT_PAGE_SIZE;
use fieldsync_domain::{FieldSyncError, PlatformConfig, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{ApiContact, ApiCustomer, ApiForm, ApiJob, ListEnvelope};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const APP_KEY_HEADER: &str = "X-App-Key";

/// Provides OAuth access tokens for platform API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Retrieve a bearer token to authorize platform API calls.
    async fn access_token(&self) -> Result<String>;
}

/// Authenticated client for the platform's tenant-scoped REST API.
pub struct FsmClient {
    http: reqwest::Client,
    base_url: String,
    tenant_id: String,
    app_key: String,
    token_provider: Arc<dyn AccessTokenProvider>,
}

impl FsmClient {
    pub fn new(config: &PlatformConfig, token_provider: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| FieldSyncError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant_id: config.tenant_id.clone(),
            app_key: config.app_key.clone(),
            token_provider,
        })
    }

    /// Issue an authenticated request against a tenant-scoped endpoint and
    /// parse the JSON response.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let token = self.token_provider.access_token().await?;
        let url = format!("{}/tenant/{}/{}", self.base_url, self.tenant_id, endpoint);

        debug!(%method, endpoint, "platform api request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(APP_KEY_HEADER, &self.app_key);

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FieldSyncError::Network(format!("request to {endpoint} failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            FieldSyncError::Network(format!("failed to read response from {endpoint}: {e}"))
        })?;

        if !status.is_success() {
            return Err(FieldSyncError::Network(format!(
                "{endpoint} returned {status}: {text}"
            )));
        }

        let payload = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(payload).map_err(|e| {
            FieldSyncError::Internal(format!("malformed response from {endpoint}: {e}"))
        })
    }

    /// One page of customers. Page numbering starts at 1.
    pub async fn customers_page(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<ListEnvelope<ApiCustomer>> {
        self.request_json(
            Method::GET,
            "customers",
            &[("page", page.to_string()), ("pageSize", page_size.to_string())],
            None,
        )
        .await
    }

    pub async fn get_customer(&self, customer_id: &str) -> Result<ApiCustomer> {
        self.request_json(Method::GET, &format!("customers/{customer_id}"), &[], None).await
    }

    pub async fn get_customer_contacts(&self, customer_id: &str) -> Result<Vec<ApiContact>> {
        let envelope: ListEnvelope<ApiContact> = self
            .request_json(Method::GET, &format!("customers/{customer_id}/contacts"), &[], None)
            .await?;
        Ok(envelope.data)
    }

    /// Exact-value contacts search. Returns contact records with their
    /// owning customer ids.
    pub async fn search_contacts(&self, value: &str) -> Result<Vec<ApiContact>> {
        let envelope: ListEnvelope<ApiContact> = self
            .request_json(Method::GET, "contacts", &[("value", value.to_string())], None)
            .await?;
        Ok(envelope.data)
    }

    /// Exact email filter over customers.
    pub async fn find_customers_by_email(&self, email: &str) -> Result<Vec<ApiCustomer>> {
        let envelope: ListEnvelope<ApiCustomer> = self
            .request_json(Method::GET, "customers", &[("email", email.to_string())], None)
            .await?;
        Ok(envelope.data)
    }

    /// One page of jobs, optionally bounded below by modification time.
    ///
    /// Returns raw JSON values so callers can stage exact payloads; items
    /// are parsed into [`ApiJob`] downstream.
    pub async fn jobs_page(
        &self,
        page: usize,
        page_size: usize,
        modified_on_or_after: Option<DateTime<Utc>>,
    ) -> Result<ListEnvelope<serde_json::Value>> {
        let mut query =
            vec![("page", page.to_string()), ("pageSize", page_size.to_string())];
        if let Some(cutoff) = modified_on_or_after {
            query.push(("modifiedOnOrAfter", cutoff.to_rfc3339()));
        }

        self.request_json(Method::GET, "jobs", &query, None).await
    }

    /// One page of a customer's completed jobs.
    pub async fn completed_jobs_page(
        &self,
        customer_id: &str,
        page: usize,
    ) -> Result<ListEnvelope<ApiJob>> {
        self.request_json(
            Method::GET,
            "jobs",
            &[
                ("customerId", customer_id.to_string()),
                ("status", "Completed".to_string()),
                ("page", page.to_string()),
                ("pageSize", JOB_COUNT_PAGE_SIZE.to_string()),
            ],
            None,
        )
        .await
    }

    pub async fn get_job_forms(&self, job_id: &str) -> Result<Vec<ApiForm>> {
        let envelope: ListEnvelope<ApiForm> = self
            .request_json(Method::GET, &format!("jobs/{job_id}/forms"), &[], None)
            .await?;
        Ok(envelope.data)
    }

    pub async fn update_membership_status(
        &self,
        membership_id: &str,
        status: &str,
    ) -> Result<()> {
        let body = serde_json::json!({ "status": status });
        let _: serde_json::Value = self
            .request_json(
                Method::PUT,
                &format!("memberships/{membership_id}/status"),
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }
}
