//! CalDAV source configuration.

use std::fmt;
use std::time::Duration;
use url::Url;

/// Username and password for HTTP authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The account name.
    pub username: String,
    /// The account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the CalDAV source.
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    /// URL of the calendar home (the collection holding the calendars).
    pub url: Url,

    /// Credentials, if the server requires authentication.
    pub credentials: Option<Credentials>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl CalDavConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a new CalDAV configuration with the given URL.
    ///
    /// A trailing slash is appended to the path so relative hrefs resolve
    /// below the calendar home.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        let mut parsed = Url::parse(url.as_ref())?;
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        Ok(Self {
            url: parsed,
            credentials: None,
            verify_tls: true,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calbrief/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Disables TLS verification (for self-signed test servers only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Resolves `href` against the configured URL.
    ///
    /// Absolute URLs are returned unchanged.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        self.url
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_creation() {
        let config = CalDavConfig::new("https://dav.example.com/remote.php/dav/calendars/me").unwrap();
        assert_eq!(
            config.url.as_str(),
            "https://dav.example.com/remote.php/dav/calendars/me/"
        );
        assert!(config.credentials.is_none());
        assert!(config.verify_tls);
        assert!(config.user_agent.starts_with("calbrief/"));
    }

    #[test]
    fn config_builder_methods() {
        let config = CalDavConfig::new("https://dav.example.com/")
            .unwrap()
            .with_credentials("me", "secret")
            .with_insecure_tls()
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.credentials, Some(Credentials::new("me", "secret")));
        assert!(!config.verify_tls);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("me", "hunter2"));
        assert!(debug.contains("me"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn resolve_hrefs() {
        let config = CalDavConfig::new("https://dav.example.com/calendars/me/").unwrap();

        assert_eq!(
            config.resolve("work/"),
            "https://dav.example.com/calendars/me/work/"
        );
        assert_eq!(
            config.resolve("/calendars/me/birthdays/"),
            "https://dav.example.com/calendars/me/birthdays/"
        );
        assert_eq!(
            config.resolve("https://other.example.com/cal/"),
            "https://other.example.com/cal/"
        );
    }

    #[test]
    fn invalid_url_returns_error() {
        assert!(CalDavConfig::new("not a valid url").is_err());
    }
}
