//! Video provider configuration (VdoCipher)

use serde::Deserialize;

use super::error::ValidationError;
use super::payment::check_url;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// VdoCipher API secret
    pub api_secret: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Lifetime of an issued playback OTP
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_secs: u64,
}

impl VideoConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_secret.is_empty() {
            return Err(ValidationError::MissingRequired("VIDEO_API_SECRET"));
        }
        check_url(&self.api_base_url, "VIDEO_API_BASE_URL")?;
        if self.otp_ttl_secs == 0 || self.otp_ttl_secs > 86_400 {
            return Err(ValidationError::InvalidOtpTtl);
        }
        Ok(())
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            api_secret: String::new(),
            api_base_url: default_api_base_url(),
            otp_ttl_secs: default_otp_ttl(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://dev.vdocipher.com/api".to_string()
}

fn default_otp_ttl() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VideoConfig::default();
        assert_eq!(config.api_base_url, "https://dev.vdocipher.com/api");
        assert_eq!(config.otp_ttl_secs, 300);
    }

    #[test]
    fn test_missing_secret() {
        assert_eq!(
            VideoConfig::default().validate(),
            Err(ValidationError::MissingRequired("VIDEO_API_SECRET"))
        );
    }

    #[test]
    fn test_ttl_bounds() {
        let config = VideoConfig {
            api_secret: "vdo_secret".to_string(),
            otp_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidOtpTtl));

        let config = VideoConfig {
            otp_ttl_secs: 600,
            ..config
        };
        assert!(config.validate().is_ok());
    }
}
