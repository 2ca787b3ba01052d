//! HTTP Basic authentication in front of the DAV handler.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use dav_server::body::Body;
use hyper::header::{AUTHORIZATION, HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use oxdav_core::WebDavAuth;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Realm used when the server label is not a valid header value.
const FALLBACK_CHALLENGE: &str = "Basic realm=\"oxdav\"";

/// Checks the `Authorization` header of every request.
pub(crate) struct BasicAuthGate {
    /// Expected `username:password`
    expected: SecretString,
    challenge: HeaderValue,
}

impl BasicAuthGate {
    /// Build a gate, or `None` for anonymous access.
    pub(crate) fn new(auth: &WebDavAuth, realm: &str) -> Option<Self> {
        match auth {
            WebDavAuth::Anonymous => None,
            WebDavAuth::Basic { username, password } => {
                let realm = realm.replace('"', "'");
                let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CHALLENGE));
                Some(Self {
                    expected: SecretString::from(format!(
                        "{username}:{}",
                        password.expose_secret()
                    )),
                    challenge,
                })
            }
        }
    }

    /// Whether the request carries the expected credentials.
    pub(crate) fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some((scheme, encoded)) = value.split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };

        decoded
            .as_slice()
            .ct_eq(self.expected.expose_secret().as_bytes())
            .into()
    }

    /// 401 response asking the client for credentials.
    pub(crate) fn challenge(&self) -> Response<Body> {
        let mut response = Response::new(Body::from("Authentication required\n".to_string()));
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}
