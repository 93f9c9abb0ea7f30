//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Recurring price the checkout session subscribes to
    pub stripe_price_id: String,

    /// Where Stripe sends the user after a successful checkout
    pub success_url: String,

    /// Where Stripe sends the user after abandoning checkout
    pub cancel_url: String,

    /// Where the billing portal's "return" link points
    pub portal_return_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Reject webhook events whose livemode differs from the API key's
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }
        if self.stripe_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_PRICE_ID"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if !self.stripe_price_id.starts_with("price_") {
            return Err(ValidationError::InvalidStripePriceId);
        }

        check_url(&self.success_url, "SUCCESS_URL")?;
        check_url(&self.cancel_url, "CANCEL_URL")?;
        check_url(&self.portal_return_url, "PORTAL_RETURN_URL")?;
        check_url(&self.api_base_url, "API_BASE_URL")?;

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_price_id: String::new(),
            success_url: String::new(),
            cancel_url: String::new(),
            portal_return_url: String::new(),
            api_base_url: default_api_base_url(),
            require_livemode: false,
        }
    }
}

pub(super) fn check_url(url: &str, name: &'static str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ValidationError::InvalidUrl(name));
    }
    Ok(())
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
            stripe_price_id: "price_monthly".to_string(),
            success_url: "https://t.me/member_gate_bot?start=paid".to_string(),
            cancel_url: "https://t.me/member_gate_bot".to_string(),
            portal_return_url: "https://t.me/member_gate_bot".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = valid();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = PaymentConfig {
            stripe_api_key: "sk_live_xxx".to_string(),
            ..valid()
        };
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_default_api_base_url() {
        assert_eq!(PaymentConfig::default().api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn test_validation_missing_api_key() {
        let config = PaymentConfig::default();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(), // Wrong prefix
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(), // Wrong prefix
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_validation_invalid_price_id() {
        let config = PaymentConfig {
            stripe_price_id: "prod_123".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripePriceId));
    }

    #[test]
    fn test_validation_rejects_relative_redirect() {
        let config = PaymentConfig {
            success_url: "/thanks".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidUrl("SUCCESS_URL"))
        );
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate().is_ok());
    }
}
