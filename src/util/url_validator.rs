use thiserror::Error;
use url::Url;

/// Errors that can occur during endpoint validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the configured feed endpoint.
///
/// Only parse errors, non-HTTP(S) schemes and host-less URLs are rejected;
/// the endpoint is chosen by the user, so local addresses are allowed.
///
/// # Examples
///
/// ```
/// use announcer::util::validate_endpoint;
///
/// let url = validate_endpoint("http://studentsblog.sst.edu.sg/feeds/posts/default").unwrap();
/// assert_eq!(url.host_str(), Some("studentsblog.sst.edu.sg"));
///
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Checks that an article link is safe to hand to the system browser.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    validate_endpoint(url_str)
}
