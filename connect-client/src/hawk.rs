// connect-client/src/hawk.rs
//! Hawk request and response authentication.
//!
//! Requests carry `Authorization: Hawk id=.., ts=.., nonce=.., hash=.., mac=..`
//! and the server answers with `Server-Authorization: Hawk mac=.., hash=..`
//! computed over the same timestamp, nonce and request target.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use url::Url;

use common::{generate_nonce, sha256_base64, unix_timestamp};

use crate::credentials::Credentials;
use crate::error::AuthError;
use crate::transport::{HttpRequest, HttpResponse, Method};

type HmacSha256 = Hmac<Sha256>;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const SERVER_AUTHORIZATION_HEADER: &str = "Server-Authorization";

const HEADER_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacType {
    Header,
    Response,
}

impl MacType {
    fn as_str(&self) -> &'static str {
        match self {
            MacType::Header => "header",
            MacType::Response => "response",
        }
    }
}

/// Everything a Hawk MAC covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub method: String,
    /// Path and query of the request URL
    pub resource: String,
    pub host: String,
    pub port: u16,
    pub ts: i64,
    pub nonce: String,
    pub hash: Option<String>,
    pub ext: Option<String>,
}

impl Artifacts {
    pub fn for_request(
        method: Method,
        url: &Url,
        ts: i64,
        nonce: impl Into<String>,
        hash: Option<String>,
    ) -> Result<Self, AuthError> {
        let host = url
            .host_str()
            .ok_or_else(|| AuthError::MalformedHeader(format!("no host in {}", url)))?
            .to_ascii_lowercase();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| AuthError::MalformedHeader(format!("no port for {}", url)))?;
        let resource = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self {
            method: method.as_str().to_string(),
            resource,
            host,
            port,
            ts,
            nonce: nonce.into(),
            hash,
            ext: None,
        })
    }
}

/// The string the MAC is calculated over
pub fn normalized_string(mac_type: MacType, artifacts: &Artifacts) -> String {
    let ext = artifacts
        .ext
        .as_deref()
        .map(|ext| ext.replace('\\', "\\\\").replace('\n', "\\n"))
        .unwrap_or_default();

    format!(
        "hawk.{}.{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        HEADER_VERSION,
        mac_type.as_str(),
        artifacts.ts,
        artifacts.nonce,
        artifacts.method.to_ascii_uppercase(),
        artifacts.resource,
        artifacts.host,
        artifacts.port,
        artifacts.hash.as_deref().unwrap_or(""),
        ext,
    )
}

fn mac_for(credentials: &Credentials, mac_type: MacType, artifacts: &Artifacts) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(credentials.key.as_bytes())
        .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
    mac.update(normalized_string(mac_type, artifacts).as_bytes());
    Ok(mac)
}

/// Base64 encoded MAC of the artifacts
pub fn calculate_mac(credentials: &Credentials, mac_type: MacType, artifacts: &Artifacts) -> Result<String, AuthError> {
    let mac = mac_for(credentials, mac_type, artifacts)?;
    Ok(base64::encode(mac.finalize().into_bytes()))
}

/// Check a base64 encoded MAC in constant time
pub fn verify_mac(
    credentials: &Credentials,
    mac_type: MacType,
    artifacts: &Artifacts,
    mac_b64: &str,
) -> Result<(), AuthError> {
    let given = base64::decode(mac_b64)
        .map_err(|_| AuthError::ServerAuthInvalid("mac is not base64".to_string()))?;
    mac_for(credentials, mac_type, artifacts)?
        .verify_slice(&given)
        .map_err(|_| AuthError::ServerAuthInvalid("bad mac".to_string()))
}

/// Base64 encoded hash of a payload and its content type
pub fn payload_hash(content_type: &str, payload: &[u8]) -> String {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let mut normalized = format!("hawk.{}.payload\n{}\n", HEADER_VERSION, content_type).into_bytes();
    normalized.extend_from_slice(payload);
    normalized.push(b'\n');
    sha256_base64(&normalized)
}

/// Parse the attributes of a `Hawk ...` header value
pub fn parse_header(value: &str) -> Result<HashMap<String, String>, AuthError> {
    let malformed = |reason: &str| AuthError::MalformedHeader(reason.to_string());

    let value = value.trim();
    let (scheme, mut rest) = value.split_once(' ').ok_or_else(|| malformed("missing attributes"))?;
    if !scheme.eq_ignore_ascii_case("hawk") {
        return Err(malformed("not a Hawk header"));
    }

    let mut attributes = HashMap::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        let (key, after_key) = rest.split_once('=').ok_or_else(|| malformed("attribute without value"))?;
        let after_quote = after_key.strip_prefix('"').ok_or_else(|| malformed("unquoted attribute value"))?;
        let (attr_value, after_value) = after_quote.split_once('"').ok_or_else(|| malformed("unterminated attribute value"))?;

        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(malformed("invalid attribute name"));
        }
        if attributes.insert(key.to_string(), attr_value.to_string()).is_some() {
            return Err(AuthError::MalformedHeader(format!("duplicate attribute {}", key)));
        }

        rest = after_value;
    }

    Ok(attributes)
}

/// `Authorization` header value for a request
pub fn request_header(credentials: &Credentials, artifacts: &Artifacts) -> Result<String, AuthError> {
    let mac = calculate_mac(credentials, MacType::Header, artifacts)?;

    let mut header = format!(
        "Hawk id=\"{}\", ts=\"{}\", nonce=\"{}\"",
        credentials.id, artifacts.ts, artifacts.nonce
    );
    if let Some(hash) = &artifacts.hash {
        header.push_str(&format!(", hash=\"{}\"", hash));
    }
    if let Some(ext) = &artifacts.ext {
        header.push_str(&format!(", ext=\"{}\"", ext));
    }
    header.push_str(&format!(", mac=\"{}\"", mac));
    Ok(header)
}

/// `Server-Authorization` header value for a response. The artifacts are the
/// request's, with `hash` and `ext` describing the response.
pub fn response_header(credentials: &Credentials, artifacts: &Artifacts) -> Result<String, AuthError> {
    let mac = calculate_mac(credentials, MacType::Response, artifacts)?;

    let mut header = format!("Hawk mac=\"{}\"", mac);
    if let Some(hash) = &artifacts.hash {
        header.push_str(&format!(", hash=\"{}\"", hash));
    }
    if let Some(ext) = &artifacts.ext {
        header.push_str(&format!(", ext=\"{}\"", ext));
    }
    Ok(header)
}

/// A request authorization and the artifacts needed to check the response to it
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub header_name: &'static str,
    pub header_value: String,
    pub artifacts: Artifacts,
}

/// Scheme used to authenticate requests and responses
pub trait MacScheme: Send + Sync {
    fn sign(&self, request: &HttpRequest, credentials: &Credentials) -> Result<SignedRequest, AuthError>;

    /// Check the server's authentication of a response. The payload must not
    /// be used when this fails.
    fn verify(
        &self,
        signed: &SignedRequest,
        response: &HttpResponse,
        credentials: &Credentials,
    ) -> Result<(), AuthError>;
}

/// Hawk with SHA-256 MACs
#[derive(Debug, Clone, Copy, Default)]
pub struct Hawk;

impl MacScheme for Hawk {
    fn sign(&self, request: &HttpRequest, credentials: &Credentials) -> Result<SignedRequest, AuthError> {
        let hash = if request.body.is_empty() {
            None
        } else {
            let content_type = request.header("content-type").unwrap_or("");
            Some(payload_hash(content_type, &request.body))
        };

        let artifacts = Artifacts::for_request(
            request.method,
            &request.url,
            unix_timestamp(),
            generate_nonce(),
            hash,
        )?;
        let header_value = request_header(credentials, &artifacts)?;

        Ok(SignedRequest {
            header_name: AUTHORIZATION_HEADER,
            header_value,
            artifacts,
        })
    }

    fn verify(
        &self,
        signed: &SignedRequest,
        response: &HttpResponse,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        let header = response
            .header(SERVER_AUTHORIZATION_HEADER)
            .ok_or(AuthError::ServerAuthMissing)?;
        let attributes = parse_header(header).map_err(|e| AuthError::ServerAuthInvalid(e.to_string()))?;
        let mac = attributes
            .get("mac")
            .ok_or_else(|| AuthError::ServerAuthInvalid("missing mac".to_string()))?;

        let artifacts = Artifacts {
            hash: attributes.get("hash").cloned(),
            ext: attributes.get("ext").cloned(),
            ..signed.artifacts.clone()
        };
        verify_mac(credentials, MacType::Response, &artifacts, mac)?;

        match &artifacts.hash {
            Some(hash) => {
                let content_type = response.header("content-type").unwrap_or("");
                if !payload_matches(hash, content_type, &response.body) {
                    return Err(AuthError::ServerAuthInvalid("bad payload hash".to_string()));
                }
            }
            None if !response.body.is_empty() => {
                return Err(AuthError::ServerAuthInvalid("payload is not covered by the mac".to_string()));
            }
            None => {}
        }

        Ok(())
    }
}

// JSON encoders end bodies with a newline the server does not always hash
fn payload_matches(hash: &str, content_type: &str, body: &[u8]) -> bool {
    if payload_hash(content_type, body) == hash {
        return true;
    }
    match body.strip_suffix(b"\n") {
        Some(trimmed) => payload_hash(content_type, trimmed) == hash,
        None => false,
    }
}
