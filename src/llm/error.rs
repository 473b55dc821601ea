//! Provider error taxonomy.
//!
//! Every variant carries a stable code (SCREAMING_SNAKE_CASE) included in
//! the Display output as `[CODE] message`. The failover chain uses
//! [`ProviderError::is_retryable`] to choose between backing off and
//! falling through to the next provider.

/// Stable error codes for programmatic handling.
pub mod error_codes {
    /// No credential configured for the provider.
    pub const API_KEY_MISSING: &str = "API_KEY_MISSING";
    /// HTTP 401.
    pub const API_KEY_INVALID: &str = "API_KEY_INVALID";
    /// HTTP 403.
    pub const API_ACCESS_FORBIDDEN: &str = "API_ACCESS_FORBIDDEN";
    /// HTTP 429.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    /// HTTP 5xx.
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    /// Connection refused, DNS failure, timeout.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    /// Any other non-success status or an unparseable body.
    pub const API_ERROR: &str = "API_ERROR";
    /// Success status but no usable text.
    pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
    /// The chain has no entries.
    pub const NO_PROVIDERS: &str = "NO_PROVIDERS";
}

/// Failure of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("[{}] {}", error_codes::API_KEY_MISSING, .0)]
    KeyMissing(String),

    #[error("[{}] {}", error_codes::API_KEY_INVALID, .0)]
    KeyInvalid(String),

    #[error("[{}] {}", error_codes::API_ACCESS_FORBIDDEN, .0)]
    Forbidden(String),

    #[error("[{}] {}", error_codes::RATE_LIMITED, .0)]
    RateLimited(String),

    #[error("[{}] {}", error_codes::SERVER_ERROR, .0)]
    Server(String),

    #[error("[{}] {}", error_codes::NETWORK_ERROR, .0)]
    Network(String),

    #[error("[{}] {}", error_codes::API_ERROR, .0)]
    Api(String),

    #[error("[{}] {}", error_codes::EMPTY_RESPONSE, .0)]
    EmptyResponse(String),

    #[error("[{}] {}", error_codes::NO_PROVIDERS, .0)]
    NoProviders(String),
}

impl ProviderError {
    /// Stable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::KeyMissing(_) => error_codes::API_KEY_MISSING,
            Self::KeyInvalid(_) => error_codes::API_KEY_INVALID,
            Self::Forbidden(_) => error_codes::API_ACCESS_FORBIDDEN,
            Self::RateLimited(_) => error_codes::RATE_LIMITED,
            Self::Server(_) => error_codes::SERVER_ERROR,
            Self::Network(_) => error_codes::NETWORK_ERROR,
            Self::Api(_) => error_codes::API_ERROR,
            Self::EmptyResponse(_) => error_codes::EMPTY_RESPONSE,
            Self::NoProviders(_) => error_codes::NO_PROVIDERS,
        }
    }

    /// Inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::KeyMissing(m)
            | Self::KeyInvalid(m)
            | Self::Forbidden(m)
            | Self::RateLimited(m)
            | Self::Server(m)
            | Self::Network(m)
            | Self::Api(m)
            | Self::EmptyResponse(m)
            | Self::NoProviders(m) => m,
        }
    }

    /// Rate limits, 5xx and network failures are worth another attempt.
    /// Credential and configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Server(_) | Self::Network(_)
        )
    }

    /// Text suitable for the conversation surface.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::KeyMissing(_) => {
                "API Configuration Error: an API key is missing. Add it to the config file or environment."
            }
            Self::KeyInvalid(_) => "API Key Error: the configured API key is invalid.",
            Self::Forbidden(_) => {
                "Access Forbidden: check the provider account billing and permissions."
            }
            Self::RateLimited(_) => {
                "Rate Limited: the service has strict limits. Please wait a moment before trying again."
            }
            Self::Server(_) => "Server Error: the AI service is experiencing issues.",
            Self::Network(_) => "Network Error: check your internet connection and try again.",
            Self::Api(_) => "System Error: something went wrong with the AI service.",
            Self::EmptyResponse(_) => "The AI service returned an empty response.",
            Self::NoProviders(_) => "No AI providers are configured.",
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(provider: &str, status: u16, detail: &str) -> Self {
        match status {
            401 => Self::KeyInvalid(format!("{provider} rejected the API key: {detail}")),
            403 => Self::Forbidden(format!("{provider} access forbidden: {detail}")),
            429 => Self::RateLimited(format!("{provider} rate limited: {detail}")),
            500..=599 => Self::Server(format!("{provider} HTTP {status}: {detail}")),
            _ => Self::Api(format!("{provider} HTTP {status}: {detail}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = ProviderError::RateLimited("openrouter rate limited".into());
        assert_eq!(err.to_string(), "[RATE_LIMITED] openrouter rate limited");
        assert_eq!(err.message(), "openrouter rate limited");
    }

    #[test]
    fn status_classification() {
        assert_eq!(ProviderError::from_status("p", 401, "").code(), "API_KEY_INVALID");
        assert_eq!(ProviderError::from_status("p", 403, "").code(), "API_ACCESS_FORBIDDEN");
        assert_eq!(ProviderError::from_status("p", 429, "").code(), "RATE_LIMITED");
        assert_eq!(ProviderError::from_status("p", 503, "").code(), "SERVER_ERROR");
        assert_eq!(ProviderError::from_status("p", 400, "").code(), "API_ERROR");
    }

    #[test]
    fn retryable_classes() {
        assert!(ProviderError::RateLimited(String::new()).is_retryable());
        assert!(ProviderError::Server(String::new()).is_retryable());
        assert!(ProviderError::Network(String::new()).is_retryable());

        assert!(!ProviderError::KeyMissing(String::new()).is_retryable());
        assert!(!ProviderError::KeyInvalid(String::new()).is_retryable());
        assert!(!ProviderError::Forbidden(String::new()).is_retryable());
        assert!(!ProviderError::Api(String::new()).is_retryable());
        assert!(!ProviderError::EmptyResponse(String::new()).is_retryable());
    }

    #[test]
    fn user_messages_never_expose_codes() {
        let err = ProviderError::Network("connection refused".into());
        assert!(!err.user_message().contains("NETWORK_ERROR"));
        assert!(err.user_message().starts_with("Network Error"));
    }
}
