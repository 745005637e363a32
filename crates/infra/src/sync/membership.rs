//! Bulk membership status updates.

use std::sync::Arc;

use fieldsync_domain::{ItemFailure, MembershipUpdate, MembershipUpdateReport, Result};
use tracing::{info, instrument, warn};

use crate::integrations::fsm::FsmClient;

/// Applies membership status changes against the platform.
pub struct MembershipManager {
    client: Arc<FsmClient>,
}

impl MembershipManager {
    pub fn new(client: Arc<FsmClient>) -> Self {
        Self { client }
    }

    /// Apply updates strictly sequentially, accumulating partial success.
    ///
    /// Sequential on purpose: the platform rate-limits, and a burst of
    /// parallel status writes trips it. One failed update is recorded and
    /// the loop continues, so the caller can resubmit only the failed
    /// subset.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn bulk_update_memberships(
        &self,
        updates: &[MembershipUpdate],
    ) -> Result<MembershipUpdateReport> {
        let mut report = MembershipUpdateReport::default();

        for update in updates {
            match self
                .client
                .update_membership_status(&update.membership_id, &update.status)
                .await
            {
                Ok(()) => report.success += 1,
                Err(e) => {
                    warn!(
                        membership_id = %update.membership_id,
                        error = %e,
                        "membership update failed"
                    );
                    report.failed += 1;
                    report.errors.push(ItemFailure {
                        id: update.membership_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(success = report.success, failed = report.failed, "bulk membership update done");
        Ok(report)
    }
}
