//! Target URL checks for links.

use url::Url;

/// Longest accepted target URL, in bytes.
pub const MAX_TARGET_URL_LENGTH: usize = 2048;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetUrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("URL must include a host")]
    MissingHost,

    #[error("URL must be at most 2048 characters")]
    TooLong,
}

/// Accepts absolute `http`/`https` URLs with a host, up to
/// [`MAX_TARGET_URL_LENGTH`] bytes. The URL is stored as given.
///
/// Rejects schemes a browser would execute or read locally, like
/// `javascript:`, `data:` and `file:`.
pub fn check_target_url(input: &str) -> Result<(), TargetUrlError> {
    if input.len() > MAX_TARGET_URL_LENGTH {
        return Err(TargetUrlError::TooLong);
    }

    let url = Url::parse(input).map_err(|e| TargetUrlError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(TargetUrlError::UnsupportedProtocol),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(TargetUrlError::MissingHost);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert_eq!(check_target_url("https://example.com/path?q=1#frag"), Ok(()));
        assert_eq!(check_target_url("http://localhost:3000"), Ok(()));
    }

    #[test]
    fn test_rejects_dangerous_schemes() {
        assert_eq!(
            check_target_url("javascript:alert(1)"),
            Err(TargetUrlError::UnsupportedProtocol)
        );
        assert_eq!(
            check_target_url("data:text/html,hi"),
            Err(TargetUrlError::UnsupportedProtocol)
        );
        assert_eq!(
            check_target_url("ftp://example.com/file"),
            Err(TargetUrlError::UnsupportedProtocol)
        );
    }

    #[test]
    fn test_rejects_relative_urls() {
        assert!(matches!(
            check_target_url("/just/a/path"),
            Err(TargetUrlError::InvalidFormat(_))
        ));
        assert!(matches!(
            check_target_url("example.com"),
            Err(TargetUrlError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_length_limit() {
        let base = "https://example.com/";
        let ok = format!("{base}{}", "a".repeat(MAX_TARGET_URL_LENGTH - base.len()));
        let too_long = format!("{ok}a");

        assert_eq!(check_target_url(&ok), Ok(()));
        assert_eq!(check_target_url(&too_long), Err(TargetUrlError::TooLong));
    }
}
