//! Payment configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    #[serde(default)]
    pub stripe_webhook_secret: String,

    /// Price lookup keys shown on the pricing page (comma-separated)
    #[serde(default = "default_price_lookup_keys")]
    pub price_lookup_keys: String,

    /// Upper bound on a single Stripe API call, in seconds
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Reject webhook events whose `livemode` flag is false
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

    /// Lookup keys as a list, blanks dropped
    pub fn lookup_keys(&self) -> Vec<String> {
        self.price_lookup_keys
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get provider timeout as Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Catches publishable keys pasted in place of secret keys
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.lookup_keys().is_empty() {
            return Err(ValidationError::NoPriceLookupKeys);
        }
        if !(1..=60).contains(&self.provider_timeout_secs) {
            return Err(ValidationError::InvalidProviderTimeout);
        }
        if self.require_livemode && !self.is_live_mode() {
            return Err(ValidationError::LivemodeRequiresLiveKey);
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            price_lookup_keys: default_price_lookup_keys(),
            provider_timeout_secs: default_provider_timeout(),
            require_livemode: false,
        }
    }
}

fn default_price_lookup_keys() -> String {
    "monthly".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: "sk_test_abcd1234".to_string(),
            stripe_webhook_secret: "whsec_xyz789".to_string(),
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
    fn test_defaults() {
        let config = PaymentConfig::default();
        assert_eq!(config.lookup_keys(), vec!["monthly"]);
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
        assert!(!config.require_livemode);
    }

    #[test]
    fn test_lookup_keys_parsing() {
        let config = PaymentConfig {
            price_lookup_keys: "monthly, yearly,,".to_string(),
            ..valid()
        };
        assert_eq!(config.lookup_keys(), vec!["monthly", "yearly"]);
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
    fn test_validation_missing_webhook_secret() {
        let config = PaymentConfig {
            stripe_webhook_secret: String::new(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: "pk_test_xxx".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: "secret_xxx".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_validation_empty_lookup_keys() {
        let config = PaymentConfig {
            price_lookup_keys: " , ".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::NoPriceLookupKeys));
    }

    #[test]
    fn test_validation_provider_timeout_bounds() {
        for secs in [0, 61] {
            let config = PaymentConfig {
                provider_timeout_secs: secs,
                ..valid()
            };
            assert_eq!(
                config.validate(),
                Err(ValidationError::InvalidProviderTimeout)
            );
        }
        let config = PaymentConfig {
            provider_timeout_secs: 60,
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_livemode_needs_live_key() {
        let config = PaymentConfig {
            require_livemode: true,
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::LivemodeRequiresLiveKey)
        );
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate().is_ok());
    }
}
