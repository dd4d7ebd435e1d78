//! URL utilities for provider addresses and safe logging

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static QUERY_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:username|password|user|pass|pwd|passwd)=)[^&#]*")
        .expect("Invalid credential parameter pattern")
});

static PATH_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(movie|series|live|timeshift)/[^/]+/[^/]+/")
        .expect("Invalid stream path pattern")
});

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Normalize URL scheme by ensuring it has a proper HTTP/HTTPS prefix
    ///
    /// Provider addresses are often entered without a scheme; plain HTTP is assumed.
    ///
    /// ```rust
    /// use strm_sync::utils::url::UrlUtils;
    ///
    /// assert_eq!(UrlUtils::normalize_scheme("example.com"), "http://example.com");
    /// assert_eq!(UrlUtils::normalize_scheme("https://example.com"), "https://example.com");
    /// ```
    pub fn normalize_scheme(url: &str) -> String {
        let trimmed = url.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        }
    }

    /// Provider base URL: scheme normalized, configured port applied when the address
    /// carries none, no path and no trailing slash.
    pub fn provider_base(url: &str, port: Option<u16>) -> Result<String, url::ParseError> {
        let mut parsed = Url::parse(&Self::normalize_scheme(url))?;

        if parsed.port().is_none()
            && let Some(port) = port
            && parsed.port_or_known_default() != Some(port)
        {
            // only fails for cannot-be-a-base URLs, which http(s) never is
            let _ = parsed.set_port(Some(port));
        }

        let host = parsed.host_str().ok_or(url::ParseError::EmptyHost)?;
        Ok(match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        })
    }

    /// Obfuscate credentials in URLs for safe logging
    ///
    /// Masks `user:pass@` userinfo, credential query parameters and the
    /// `/{kind}/{user}/{pass}/` segments of Xtream stream URLs.
    ///
    /// ```rust
    /// use strm_sync::utils::url::UrlUtils;
    ///
    /// let url = "http://example.com/player_api.php?username=user&password=secret";
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials(url),
    ///     "http://example.com/player_api.php?username=****&password=****"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut new_url = parsed.clone();
            let _ = new_url.set_username("****");
            let _ = new_url.set_password(Some("****"));
            obfuscated = new_url.to_string();
        }

        let obfuscated = QUERY_CREDENTIALS.replace_all(&obfuscated, "${1}****");
        PATH_CREDENTIALS
            .replace_all(&obfuscated, "/${1}/****/****/")
            .into_owned()
    }
}
