//! OpenBillingPortalHandler - Query handler for the self-service billing portal.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::PaymentCustomerId;
use crate::ports::{PaymentError, PaymentGateway, PortalSession};

/// Query to open a billing portal session.
#[derive(Debug, Clone)]
pub struct OpenBillingPortalQuery {
    pub customer_id: String,
}

/// Handler that creates gateway billing portal sessions.
pub struct OpenBillingPortalHandler {
    gateway: Arc<dyn PaymentGateway>,
    return_url: String,
    timeout: Duration,
}

impl OpenBillingPortalHandler {
    pub fn new(gateway: Arc<dyn PaymentGateway>, return_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            gateway,
            return_url: return_url.into(),
            timeout,
        }
    }

    pub async fn handle(&self, query: OpenBillingPortalQuery) -> Result<PortalSession, PaymentError> {
        let customer_id = PaymentCustomerId::new(query.customer_id)
            .map_err(|_| PaymentError::not_found("Customer"))?;

        let session = tokio::time::timeout(
            self.timeout,
            self.gateway
                .create_portal_session(&customer_id, &self.return_url),
        )
        .await
        .map_err(|_| PaymentError::timeout("create_portal_session"))?
        .map_err(|e| {
            tracing::warn!(customer_id = %customer_id, error = %e, "Billing portal unavailable");
            e
        })?;

        tracing::info!(customer_id = %customer_id, "Billing portal session created");
        Ok(session)
    }
}
