// connect-client/tests/support/mod.rs
// In-process connect server shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use ::common::{
    DappInfo, SessionConfirmRequest, SessionConfirmResponse, SessionInitRequest, SessionInitResponse,
    TransactionSignRequest, TransactionSignResponse,
};
use connect_client::hawk::{self, Artifacts, MacType};
use connect_client::{
    AuthError, ConnectClient, ConnectKeyPair, CredentialResolver, Credentials, HttpRequest,
    HttpResponse, KeyValueStore, MacAlgorithm, MemoryStore, StorageError, Transport, TransportError,
};

pub const CONFIRM_ID: &str = "K9/uJiX2miksx2Bp+X3L9QQFz6xX+J0icHnGsDSCcm8=";
pub const CONFIRM_CODE: &str = "88048";
pub const CONFIRM_TOKEN: &str = "v4.local.kotGdyU87V83S8E2qtvnMchNcTjmq50u2C17-mlBDzvVf_bw3xtW0vQQZ";
pub const SESSION_ID: &str = "XN/2YQP/uAdTsa3946CvbicxbwZGFPqAdep7g47UyyQ=";
pub const SESSION_EXP: i64 = 1760591204;
pub const ADDRESS: &str = "RMAZSNHVLAMY5AUWWTSDON4S2HIUV7AYY6MWWEMKYH63YLHAKLZNHQIL3A";
pub const STATIC_KEY: &str = "werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn";
pub const SIGNED_TXN: &str = "gqNzaWfEQMSfjRLM8S/j4At47sdxr8GSV+Yy//7Srs9iJlpReFs719ibxEiU+ZIpE2NJ2kJYpvPswnSx+8eIa0Jm6wJ+ZwijdHhuiaNhbXTOAA9CQKNmZWXNA+iiZnbOA1+J/aNnZW6sdGVzdG5ldC12MS4womdoxCBIY7UYpLPITsgQ8i1PEIHLD3HwWaesIN7GL39w5Qk6IqJsds4DX43lo3JjdsQgVTpfwudWgk+SmzvrmbFS1Xh2IAM+amjAWnhX5FsIJzajc25kxCBVOl/C51aCT5KbO+uZsVLVeHYgAz5qaMBaeFfkWwgnNqR0eXBlo3BheQ==";

/// How the mock server answers a request to one endpoint
#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    Status(u16, serde_json::Value),
    WithoutServerAuth,
    WithBadServerMac,
    Unreachable,
}

/// How the mock server derives the Hawk keys it shares with the client
pub enum KeyMode {
    /// X25519 key pairs behind the confirmation and session IDs
    Ecdh {
        confirm: ConnectKeyPair,
        session: ConnectKeyPair,
    },
    /// Fixed IDs and one static key, used with [`StaticCredentials`]
    Static,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
    /// Whether the client's Hawk header checked out
    pub authenticated: bool,
}

pub struct MockConnectServer {
    keys: KeyMode,
    pub init: Mutex<Reply>,
    pub confirm: Mutex<Reply>,
    pub sign: Mutex<Reply>,
    pub end: Mutex<Reply>,
    calls: Mutex<Vec<RecordedCall>>,
    // Connect ID from the last session initialization
    dapp_id: Mutex<Option<String>>,
}

impl MockConnectServer {
    pub fn new(keys: KeyMode) -> Self {
        Self {
            keys,
            init: Mutex::new(Reply::Ok),
            confirm: Mutex::new(Reply::Ok),
            sign: Mutex::new(Reply::Ok),
            end: Mutex::new(Reply::Ok),
            calls: Mutex::new(Vec::new()),
            dapp_id: Mutex::new(None),
        }
    }

    pub fn ecdh() -> Self {
        Self::new(KeyMode::Ecdh {
            confirm: ConnectKeyPair::generate(),
            session: ConnectKeyPair::generate(),
        })
    }

    pub fn fixed() -> Self {
        Self::new(KeyMode::Static)
    }

    pub fn reply_to(&self, path: &str, reply: Reply) {
        let slot = match path {
            "session/init" => &self.init,
            "session/confirm" => &self.confirm,
            "transaction/sign" => &self.sign,
            "session/end" => &self.end,
            other => panic!("unknown endpoint {}", other),
        };
        *slot.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == format!("/{}", path))
            .collect()
    }

    pub fn confirm_id(&self) -> String {
        match &self.keys {
            KeyMode::Ecdh { confirm, .. } => confirm.connect_id(),
            KeyMode::Static => CONFIRM_ID.to_string(),
        }
    }

    pub fn session_id(&self) -> String {
        match &self.keys {
            KeyMode::Ecdh { session, .. } => session.connect_id(),
            KeyMode::Static => SESSION_ID.to_string(),
        }
    }

    // Server side of the credentials the client resolves for `id`
    fn credentials(&self, id: &str) -> Option<Credentials> {
        let key = match &self.keys {
            KeyMode::Ecdh { confirm, session } => {
                let dapp_id = self.dapp_id.lock().unwrap().clone()?;
                let pair = if id == confirm.connect_id() {
                    confirm
                } else if id == session.connect_id() {
                    session
                } else {
                    return None;
                };
                base64::encode(pair.shared_secret(&dapp_id).ok()?)
            }
            KeyMode::Static => STATIC_KEY.to_string(),
        };

        Some(Credentials {
            id: id.to_string(),
            key,
            algorithm: MacAlgorithm::Sha256,
        })
    }

    // Check the client's Authorization header the way the server does
    fn authenticate(&self, request: &HttpRequest) -> Option<(Credentials, Artifacts)> {
        let header = request.header("authorization")?;
        let attrs = hawk::parse_header(header).ok()?;
        let credentials = self.credentials(attrs.get("id")?)?;

        let mut artifacts = Artifacts::for_request(
            request.method,
            &request.url,
            attrs.get("ts")?.parse().ok()?,
            attrs.get("nonce")?.clone(),
            attrs.get("hash").cloned(),
        )
        .ok()?;
        artifacts.ext = attrs.get("ext").cloned();

        if !request.body.is_empty() {
            let content_type = request.header("content-type").unwrap_or("");
            if artifacts.hash.as_deref() != Some(hawk::payload_hash(content_type, &request.body).as_str()) {
                return None;
            }
        }
        hawk::verify_mac(&credentials, MacType::Header, &artifacts, attrs.get("mac")?).ok()?;

        Some((credentials, artifacts))
    }

    fn reply(
        &self,
        reply: Reply,
        body: serde_json::Value,
        auth: Option<&(Credentials, Artifacts)>,
    ) -> Result<HttpResponse, TransportError> {
        let status_body = |status: u16, value: &serde_json::Value| {
            HttpResponse::new(status, serde_json::to_vec(value).unwrap())
                .with_header("Content-Type", "application/json")
        };

        let (credentials, request_artifacts) = match (&reply, auth) {
            (Reply::Unreachable, _) => return Err(TransportError::Connection("connection refused".to_string())),
            (Reply::Status(status, value), _) => return Ok(status_body(*status, value)),
            (_, None) => {
                return Ok(status_body(
                    401,
                    &serde_json::json!({"name": "Unauthorized", "message": "invalid Hawk authorization"}),
                ))
            }
            (_, Some(auth)) => auth,
        };

        let response = status_body(200, &body);
        let artifacts = Artifacts {
            hash: Some(hawk::payload_hash("application/json", &response.body)),
            ext: None,
            ..request_artifacts.clone()
        };

        match reply {
            Reply::WithoutServerAuth => Ok(response),
            Reply::WithBadServerMac => {
                let wrong = Credentials {
                    key: "not-the-shared-key".to_string(),
                    ..credentials.clone()
                };
                let header = hawk::response_header(&wrong, &artifacts).unwrap();
                Ok(response.with_header("Server-Authorization", header))
            }
            _ => {
                let header = hawk::response_header(credentials, &artifacts).unwrap();
                Ok(response.with_header("Server-Authorization", header))
            }
        }
    }
}

#[async_trait]
impl Transport for MockConnectServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = request.url.path().to_string();
        let auth = self.authenticate(&request);
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.clone(),
            authorization: request.header("authorization").map(str::to_string),
            body: request.body.clone(),
            authenticated: auth.is_some(),
        });

        match path.as_str() {
            "/session/init" => {
                let reply = self.init.lock().unwrap().clone();
                let body: SessionInitRequest = serde_json::from_slice(&request.body).unwrap();
                if let Reply::Ok = reply {
                    *self.dapp_id.lock().unwrap() = Some(body.dapp_id);
                    let response = SessionInitResponse {
                        id: self.confirm_id(),
                        code: CONFIRM_CODE.to_string(),
                        token: CONFIRM_TOKEN.to_string(),
                        exp: Some(1760003247),
                    };
                    return Ok(HttpResponse::new(200, serde_json::to_vec(&response).unwrap())
                        .with_header("Content-Type", "application/json"));
                }
                self.reply(reply, serde_json::Value::Null, None)
            }
            "/session/confirm" => {
                let reply = self.confirm.lock().unwrap().clone();
                let body: SessionConfirmRequest = serde_json::from_slice(&request.body).unwrap();
                assert_eq!(body.token, CONFIRM_TOKEN);
                let response = SessionConfirmResponse {
                    id: self.session_id(),
                    exp: SESSION_EXP,
                    addrs: vec![ADDRESS.to_string()],
                };
                self.reply(reply, serde_json::to_value(response).unwrap(), auth.as_ref())
            }
            "/transaction/sign" => {
                let reply = self.sign.lock().unwrap().clone();
                let body: TransactionSignRequest = serde_json::from_slice(&request.body).unwrap();
                assert!(!base64::decode(&body.transaction).unwrap().is_empty());
                let response = TransactionSignResponse {
                    signed_transaction: SIGNED_TXN.to_string(),
                };
                self.reply(reply, serde_json::to_value(response).unwrap(), auth.as_ref())
            }
            "/session/end" => {
                let reply = self.end.lock().unwrap().clone();
                self.reply(reply, serde_json::json!("OK"), auth.as_ref())
            }
            other => Ok(HttpResponse::new(404, format!("no route {}", other).into_bytes())),
        }
    }
}

/// Resolves every ID to the same static key
pub struct StaticCredentials;

impl CredentialResolver for StaticCredentials {
    fn resolve(&self, _key_pair: &ConnectKeyPair, peer_id: &str) -> Result<Credentials, AuthError> {
        Ok(Credentials {
            id: peer_id.to_string(),
            key: STATIC_KEY.to_string(),
            algorithm: MacAlgorithm::Sha256,
        })
    }
}

/// A store that is never available
pub struct UnavailableStore;

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk unplugged".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk unplugged".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk unplugged".to_string()))
    }
}

/// Confirmation codes shown to the user
#[derive(Clone, Default)]
pub struct CodeLog(Arc<Mutex<Vec<String>>>);

impl CodeLog {
    pub fn codes(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn test_dapp() -> DappInfo {
    DappInfo::new("Test DApp").with_uri("https://dapp.example")
}

/// Client talking to `server` with ECDH credentials
pub fn client_for(server: &Arc<MockConnectServer>, store: &MemoryStore, codes: &CodeLog) -> ConnectClient {
    build_client(server, Arc::new(store.clone()), codes, false)
}

/// Client talking to a server started with [`MockConnectServer::fixed`]
pub fn fixed_client_for(server: &Arc<MockConnectServer>, store: &MemoryStore, codes: &CodeLog) -> ConnectClient {
    build_client(server, Arc::new(store.clone()), codes, true)
}

pub fn build_client(
    server: &Arc<MockConnectServer>,
    store: Arc<dyn KeyValueStore>,
    codes: &CodeLog,
    static_keys: bool,
) -> ConnectClient {
    let log = codes.0.clone();
    let mut builder = ConnectClient::builder(test_dapp())
        .transport(server.clone())
        .store(store)
        .on_confirmation_code(move |code| log.lock().unwrap().push(code.to_string()));
    if static_keys {
        builder = builder.credential_resolver(Arc::new(StaticCredentials));
    }
    builder.build().unwrap()
}
