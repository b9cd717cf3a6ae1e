//! JWT service client implementation.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use jwt_client_types::{
    AccessTokenClaims, CipherError, ErrorCode, PathContext, TokenError, compile_path,
    sign_access_token,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::normalize;
use crate::config::ClientConfig;
use crate::error::codes::{
    EINVALIDPAYLOAD, EMISSINGPATHPARAM, ENOMICROSERVICEURL, ENOSERVICESECRET, ENOSERVICESLUG,
    ENOSERVICETOKEN, ETOKENSIGN,
};
use crate::error::{DefaultErrorKind, ErrorKind, JwtClientError, RequestFailure};
use crate::metrics::{Metrics, noop_metrics};
use crate::options::{AccessHeaders, RequestOptions, SearchParams};
use crate::reqwest_transport::ReqwestTransport;
use crate::transport::Transport;

/// User identity exchanged between services in encrypted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdAndToken {
    pub user_id: String,
    pub user_token: String,
}

/// Base client for one upstream service.
///
/// Holds no per-call state, so a single instance can serve concurrent calls.
pub struct JwtClient<K: ErrorKind = DefaultErrorKind> {
    pub(crate) config: ClientConfig,
    pub(crate) kind: K,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) api_metrics: Arc<dyn Metrics>,
    pub(crate) request_metrics: Arc<dyn Metrics>,
}

impl JwtClient {
    /// Create a client reporting [`JwtClientError`]s.
    ///
    /// # Returns
    /// A configured client, or a configuration error (`ENOSERVICESECRET`,
    /// `ENOSERVICETOKEN`, `ENOSERVICESLUG`, `ENOMICROSERVICEURL`) when a
    /// required value is empty.
    pub fn new(config: ClientConfig) -> Result<Self, JwtClientError> {
        Self::with_error_kind(config, DefaultErrorKind)
    }
}

impl<K: ErrorKind> JwtClient<K> {
    /// Create a client whose errors are built by `kind`.
    pub fn with_error_kind(config: ClientConfig, kind: K) -> Result<Self, K::Error> {
        let missing = if config.service_secret.expose_secret().is_empty() {
            Some(ENOSERVICESECRET)
        } else if config.service_token.expose_secret().is_empty() {
            Some(ENOSERVICETOKEN)
        } else if config.service_slug.is_empty() {
            Some(ENOSERVICESLUG)
        } else if config.service_url.is_empty() {
            Some(ENOMICROSERVICEURL)
        } else {
            None
        };
        if let Some(message) = missing {
            return Err(kind.construct(ErrorCode::from(500u16), message.to_string()));
        }

        let transport = ReqwestTransport::try_new()
            .map_err(|e| kind.construct(ErrorCode::from(500u16), e.to_string()))?;

        Ok(Self {
            config,
            kind,
            transport: Arc::new(transport),
            api_metrics: noop_metrics(),
            request_metrics: noop_metrics(),
        })
    }

    /// Replace the HTTP transport (e.g. a preconfigured `reqwest::Client`).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Builder form of [`Self::set_metrics_instrumentation`].
    pub fn with_metrics(mut self, api_metrics: Arc<dyn Metrics>, request_metrics: Arc<dyn Metrics>) -> Self {
        self.set_metrics_instrumentation(api_metrics, request_metrics);
        self
    }

    /// Install timers for whole calls (`api_metrics`) and single attempts
    /// (`request_metrics`).
    pub fn set_metrics_instrumentation(
        &mut self,
        api_metrics: Arc<dyn Metrics>,
        request_metrics: Arc<dyn Metrics>,
    ) {
        self.api_metrics = api_metrics;
        self.request_metrics = request_metrics;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn error_kind(&self) -> &K {
        &self.kind
    }

    /// Signed token binding the checksum of `payload`.
    pub fn generate_access_token<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, K::Error> {
        sign_access_token(payload, self.config.service_token.expose_secret())
            .map_err(|e| self.token_error(e))
    }

    /// Verify a token received together with `payload`.
    ///
    /// Meant for the receiving side of a call made by another client sharing
    /// the same service token.
    pub fn verify_access_token<T: Serialize + ?Sized>(
        &self,
        token: &str,
        payload: &T,
        max_age: Option<Duration>,
    ) -> Result<AccessTokenClaims, TokenError> {
        jwt_client_types::verify_access_token(
            token,
            self.config.service_token.expose_secret(),
            payload,
            max_age.map(|d| d.as_secs()),
        )
    }

    /// `service_url` followed by `pattern` with its placeholders substituted.
    pub fn create_endpoint_url(&self, pattern: &str, context: &PathContext) -> Result<String, K::Error> {
        let path = compile_path(pattern, context).map_err(|e| {
            tracing::error!(pattern, error = %e, "Failed to build endpoint URL");
            self.request_error(500u16, Some(EMISSINGPATHPARAM))
        })?;
        Ok(format!("{}{}", self.config.service_url, path))
    }

    /// Build the authenticated request for one call.
    ///
    /// A non-empty payload travels as the JSON body, or as the base64 JSON
    /// query parameter `payload` when `use_query_param` is set. The access
    /// token always signs the payload as sent.
    pub fn create_request_options(
        &self,
        url_pattern: &str,
        context: &PathContext,
        payload: &Map<String, Value>,
        use_query_param: bool,
    ) -> Result<RequestOptions, K::Error> {
        let url = self.create_endpoint_url(url_pattern, context)?;
        let x_access_token = self.generate_access_token(payload)?;

        let mut options = RequestOptions {
            url,
            headers: AccessHeaders { x_access_token },
            body: None,
            search_params: None,
            json: true,
        };

        if !payload.is_empty() {
            if use_query_param {
                let serialized = serde_json::to_string(payload)
                    .map_err(|e| self.token_error(TokenError::from(e)))?;
                options.search_params = Some(SearchParams {
                    payload: general_purpose::STANDARD.encode(serialized),
                });
            } else {
                options.body = Some(Value::Object(payload.clone()));
            }
        }

        Ok(options)
    }

    pub fn encrypt(&self, token: &str, data: &str, iv_seed: Option<&str>) -> Result<String, CipherError> {
        jwt_client_types::encrypt(token, data, iv_seed)
    }

    pub fn decrypt(&self, token: &str, encrypted_data: &str) -> Result<String, CipherError> {
        jwt_client_types::decrypt(token, encrypted_data)
    }

    /// Seal a user's identity under the service secret.
    pub fn encrypt_user_id_and_token(&self, user_id: &str, user_token: &str) -> Result<String, K::Error> {
        let identity = UserIdAndToken {
            user_id: user_id.to_string(),
            user_token: user_token.to_string(),
        };
        let serialized = serde_json::to_string(&identity).map_err(|_| self.invalid_payload())?;

        self.encrypt(self.config.service_secret.expose_secret(), &serialized, None)
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to encrypt user identity");
                self.invalid_payload()
            })
    }

    /// Open a value sealed by [`Self::encrypt_user_id_and_token`].
    ///
    /// Any cipher or JSON failure is reported as `500 EINVALIDPAYLOAD`.
    pub fn decrypt_user_id_and_token(&self, encrypted: &str) -> Result<UserIdAndToken, K::Error> {
        let plaintext = self
            .decrypt(self.config.service_secret.expose_secret(), encrypted)
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to decrypt user identity");
                self.invalid_payload()
            })?;

        serde_json::from_str(&plaintext).map_err(|_| self.invalid_payload())
    }

    /// Normalize a failure into this client's error kind.
    ///
    /// Errors the client already produced are returned unchanged.
    pub fn handle_request_error(&self, failure: impl Into<RequestFailure<K::Error>>) -> K::Error {
        match failure.into() {
            RequestFailure::Client(error) => error,
            RequestFailure::Transport(error) => {
                let (code, message) = normalize(&error);
                self.kind.construct(code, message)
            }
        }
    }

    /// Build an error of this client's kind; `message` defaults to the code.
    pub fn request_error(&self, code: impl Into<ErrorCode>, message: Option<&str>) -> K::Error {
        let code = code.into();
        let message = message.map_or_else(|| code.to_string(), str::to_string);
        self.kind.construct(code, message)
    }

    fn invalid_payload(&self) -> K::Error {
        self.request_error(500u16, Some(EINVALIDPAYLOAD))
    }

    fn token_error(&self, error: TokenError) -> K::Error {
        tracing::error!(error = %error, "Failed to sign access token");
        self.request_error(500u16, Some(ETOKENSIGN))
    }
}

/// A base client composed with service-specific data.
///
/// Dereferences to the base client, so it exposes the same operations.
///
/// # Example
/// ```rust,ignore
/// struct Billing { plans_path: String }
///
/// let client = ExtendedClient::new(JwtClient::new(config)?, Billing { plans_path: "/plans".into() });
/// let plans = client.send_get(SendArgs::new(&client.extension().plans_path), None).await?;
/// ```
pub struct ExtendedClient<X, K: ErrorKind = DefaultErrorKind> {
    base: JwtClient<K>,
    extension: X,
}

impl<X, K: ErrorKind> ExtendedClient<X, K> {
    pub fn new(base: JwtClient<K>, extension: X) -> Self {
        Self { base, extension }
    }

    pub fn extension(&self) -> &X {
        &self.extension
    }

    pub fn base_mut(&mut self) -> &mut JwtClient<K> {
        &mut self.base
    }
}

impl<X, K: ErrorKind> Deref for ExtendedClient<X, K> {
    type Target = JwtClient<K>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig::new("svc_secret", "svc_token", "users", "http://users:3000")
    }

    fn client() -> JwtClient {
        JwtClient::new(config()).unwrap()
    }

    fn ctx() -> PathContext {
        PathContext::from([
            ("s".to_string(), "a".to_string()),
            ("u".to_string(), "b".to_string()),
        ])
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_config_validation() {
        let cases = [
            (ClientConfig::new("", "t", "s", "u"), ENOSERVICESECRET),
            (ClientConfig::new("x", "", "s", "u"), ENOSERVICETOKEN),
            (ClientConfig::new("x", "t", "", "u"), ENOSERVICESLUG),
            (ClientConfig::new("x", "t", "s", ""), ENOMICROSERVICEURL),
        ];

        for (config, expected) in cases {
            let error = JwtClient::new(config).err().unwrap();
            assert_eq!(error.message, expected);
            assert_eq!(error.code, ErrorCode::Numeric(500));
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(JwtClient::new(config()).is_ok());
    }

    #[test]
    fn test_create_endpoint_url() {
        let url = client().create_endpoint_url("/service/:s/user/:u", &ctx()).unwrap();
        assert_eq!(url, "http://users:3000/service/a/user/b");
    }

    #[test]
    fn test_create_endpoint_url_missing_param() {
        let error = client()
            .create_endpoint_url("/service/:s/user/:missing", &ctx())
            .unwrap_err();
        assert_eq!(error.message, EMISSINGPATHPARAM);
    }

    #[test]
    fn test_request_options_without_payload() {
        let options = client()
            .create_request_options("/service/:s/user/:u", &ctx(), &Map::new(), false)
            .unwrap();

        assert_eq!(options.url, "http://users:3000/service/a/user/b");
        assert!(options.body.is_none());
        assert!(options.search_params.is_none());
        assert!(options.json);
        assert!(!options.headers.x_access_token.is_empty());
    }

    #[test]
    fn test_request_options_with_body() {
        let options = client()
            .create_request_options("/service/:s/user/:u", &ctx(), &payload(json!({"foo": "bar"})), false)
            .unwrap();

        assert_eq!(options.body, Some(json!({"foo": "bar"})));
        assert!(options.search_params.is_none());
    }

    #[test]
    fn test_request_options_with_query_param() {
        let options = client()
            .create_request_options("/service/:s/user/:u", &ctx(), &payload(json!({"foo": "bar"})), true)
            .unwrap();

        let expected = general_purpose::STANDARD.encode(r#"{"foo":"bar"}"#);
        assert_eq!(options.search_params.unwrap().payload, expected);
        assert!(options.body.is_none());
    }

    #[test]
    fn test_access_token_binds_sent_payload() {
        let client = client();
        let sent = payload(json!({"foo": "bar"}));
        let options = client
            .create_request_options("/service/:s/user/:u", &ctx(), &sent, true)
            .unwrap();

        let token = &options.headers.x_access_token;
        assert!(client.verify_access_token(token, &sent, Some(Duration::from_secs(60))).is_ok());
        assert!(client.verify_access_token(token, &json!({}), None).is_err());
    }

    #[test]
    fn test_user_id_and_token_round_trip() {
        let client = client();
        let sealed = client.encrypt_user_id_and_token("42", "user-token").unwrap();
        let opened = client.decrypt_user_id_and_token(&sealed).unwrap();

        assert_eq!(
            opened,
            UserIdAndToken {
                user_id: "42".into(),
                user_token: "user-token".into(),
            }
        );
        assert_eq!(
            client.decrypt("svc_secret", &sealed).unwrap(),
            r#"{"userId":"42","userToken":"user-token"}"#
        );
    }

    #[test]
    fn test_decrypt_user_id_and_token_rejects_garbage() {
        let client = client();

        let error = client.decrypt_user_id_and_token("AAAA").unwrap_err();
        assert_eq!(error.code, ErrorCode::Numeric(500));
        assert_eq!(error.message, EINVALIDPAYLOAD);

        let not_json = client.encrypt("svc_secret", "plain text", None).unwrap();
        let error = client.decrypt_user_id_and_token(&not_json).unwrap_err();
        assert_eq!(error.message, EINVALIDPAYLOAD);
    }

    #[test]
    fn test_encrypt_passes_cipher_errors() {
        assert_eq!(client().encrypt("", "x", None), Err(CipherError::NoEncryptKey));
        assert_eq!(client().decrypt("k", ""), Err(CipherError::NoDecryptValue));
    }

    #[test]
    fn test_handle_request_error_passes_own_errors_through() {
        let client = client();
        let own = JwtClientError {
            code: ErrorCode::from("ECUSTOM"),
            message: "already normalized".into(),
        };
        let returned = client.handle_request_error(RequestFailure::Client(own.clone()));
        assert_eq!(returned, own);
    }

    #[test]
    fn test_handle_request_error_normalizes_transport_errors() {
        let error = client().handle_request_error(TransportError {
            status_code: Some(404),
            ..Default::default()
        });
        assert_eq!(error.code, ErrorCode::Numeric(404));
        assert_eq!(error.message, "404");
    }

    #[test]
    fn test_request_error_defaults_message_to_code() {
        let client = client();
        assert_eq!(client.request_error(401u16, None).message, "401");
        assert_eq!(
            client.request_error("EFORBIDDEN", Some("no access")).message,
            "no access"
        );
    }

    struct Profile {
        avatar_path: &'static str,
    }

    #[test]
    fn test_extended_client_exposes_base_operations() {
        let client = ExtendedClient::new(
            client(),
            Profile {
                avatar_path: "/users/:u/avatar",
            },
        );

        let url = client
            .create_endpoint_url(client.extension().avatar_path, &ctx())
            .unwrap();
        assert_eq!(url, "http://users:3000/users/b/avatar");
    }
}
