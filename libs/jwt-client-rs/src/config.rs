use env_helpers::get_env_default;
use secrecy::SecretString;

/// Connection settings of one upstream service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Symmetric key for user identity payloads shared between services
    pub service_secret: SecretString,

    /// HMAC key used to sign per-request access tokens
    pub service_token: SecretString,

    /// Short name of the called service, used as `client_name` in labels
    pub service_slug: String,

    /// Base URL every endpoint path is appended to (e.g. "http://users:3000")
    pub service_url: String,
}

impl ClientConfig {
    pub fn new(
        service_secret: impl Into<String>,
        service_token: impl Into<String>,
        service_slug: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            service_secret: SecretString::from(service_secret.into()),
            service_token: SecretString::from(service_token.into()),
            service_slug: service_slug.into(),
            service_url: service_url.into(),
        }
    }

    /// Reads the `JWT_CLIENT_SERVICE_*` variables.
    ///
    /// Missing variables become empty strings so the client constructor can
    /// report them as `ENO*` configuration errors.
    pub fn from_env() -> Self {
        let service_secret: String = get_env_default("JWT_CLIENT_SERVICE_SECRET", String::new());
        let service_token: String = get_env_default("JWT_CLIENT_SERVICE_TOKEN", String::new());
        let service_slug: String = get_env_default("JWT_CLIENT_SERVICE_SLUG", String::new());
        let service_url: String = get_env_default("JWT_CLIENT_SERVICE_URL", String::new());

        Self::new(service_secret, service_token, service_slug, service_url)
    }
}
