//! Failure classification for generation attempts
//!
//! Every failed attempt ends in exactly one of three buckets. Safety is
//! checked first: a refused prompt says nothing about the key that sent it.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::services::gemini::ProviderError;

static QUOTA_EXCEEDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(quota exceeded|resource exhausted|resource has been exhausted|limit reached|usage limit)")
        .expect("valid quota pattern")
});

static INVALID_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(api key not valid|invalid api key|authentication failed|unauthorized)")
        .expect("valid key pattern")
});

static PERMISSION_DENIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(permission denied|access denied)").expect("valid permission pattern")
});

static SAFETY_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(blocked due to safety|safety settings|harmful|content policy|violates|inappropriate content)")
        .expect("valid safety pattern")
});

/// Canonical statuses that point at the key rather than the request
const KEY_STATUSES: &[&str] = &["RESOURCE_EXHAUSTED", "PERMISSION_DENIED", "UNAUTHENTICATED"];

/// Why a single attempt produced no story text
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Empty response from Gemini API")]
    EmptyResponse,

    #[error("Request was cancelled")]
    Cancelled,
}

/// Bucket a failed attempt falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider refused the content; the key is fine
    SafetyBlock,
    /// Quota, authentication, or permission problem with the active key
    KeyExhausted,
    /// Anything else
    Other,
}

/// Does this error text look like a content-policy refusal?
pub fn is_safety_message(message: &str) -> bool {
    SAFETY_BLOCK.is_match(message)
}

pub fn classify(error: &AttemptError) -> FailureKind {
    let provider = match error {
        AttemptError::Provider(e) => e,
        AttemptError::EmptyResponse | AttemptError::Cancelled => return FailureKind::Other,
    };

    let message = provider.to_string();

    if matches!(provider, ProviderError::Blocked { .. }) || is_safety_message(&message) {
        return FailureKind::SafetyBlock;
    }

    let status_hit = matches!(provider.status_code(), Some(429 | 401 | 403));
    let canonical_hit = matches!(
        provider,
        ProviderError::Api { status, .. } if KEY_STATUSES.contains(&status.as_str())
    );

    if status_hit
        || canonical_hit
        || QUOTA_EXCEEDED.is_match(&message)
        || INVALID_KEY.is_match(&message)
        || PERMISSION_DENIED.is_match(&message)
    {
        return FailureKind::KeyExhausted;
    }

    FailureKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn api(code: u16, status: &str, message: &str) -> AttemptError {
        AttemptError::Provider(ProviderError::Api {
            code,
            status: status.to_string(),
            message: message.to_string(),
        })
    }

    #[test]
    fn test_quota_status_codes() {
        assert_eq!(classify(&api(429, "", "slow down")), FailureKind::KeyExhausted);
        assert_eq!(classify(&api(401, "", "nope")), FailureKind::KeyExhausted);
        assert_eq!(classify(&api(403, "", "nope")), FailureKind::KeyExhausted);
    }

    #[test]
    fn test_key_message_signatures() {
        assert_eq!(
            classify(&api(400, "INVALID_ARGUMENT", "API key not valid. Please pass a valid API key.")),
            FailureKind::KeyExhausted
        );
        assert_eq!(
            classify(&api(500, "", "Quota exceeded for quota metric")),
            FailureKind::KeyExhausted
        );
        assert_eq!(
            classify(&api(500, "", "Permission denied on resource project")),
            FailureKind::KeyExhausted
        );
    }

    #[test]
    fn test_canonical_status() {
        assert_eq!(
            classify(&api(400, "PERMISSION_DENIED", "The caller does not have permission")),
            FailureKind::KeyExhausted
        );
    }

    #[test]
    fn test_safety_wins_over_status() {
        assert_eq!(
            classify(&api(403, "", "Request violates content policy")),
            FailureKind::SafetyBlock
        );
        let blocked = AttemptError::Provider(ProviderError::Blocked {
            reason: "PROHIBITED_CONTENT".to_string(),
        });
        assert_eq!(classify(&blocked), FailureKind::SafetyBlock);
    }

    #[test]
    fn test_other_failures() {
        assert_eq!(classify(&AttemptError::EmptyResponse), FailureKind::Other);
        assert_eq!(classify(&AttemptError::Cancelled), FailureKind::Other);
        assert_eq!(
            classify(&AttemptError::Provider(ProviderError::Timeout(Duration::from_secs(30)))),
            FailureKind::Other
        );
        assert_eq!(
            classify(&api(500, "INTERNAL", "An internal error has occurred")),
            FailureKind::Other
        );
    }

    #[test]
    fn test_safety_message_detection() {
        assert!(is_safety_message("Text not available. Response was blocked due to SAFETY"));
        assert!(!is_safety_message("deadline exceeded"));
    }
}
