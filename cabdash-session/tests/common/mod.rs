//! Scripted in-memory backend shared by the integration tests

#![allow(dead_code)]

use cabdash_core::{async_trait, auth_error, not_found_error, CabError, CabResult, ErrorContext};
use cabdash_session::{
    Credentials, Profile, RegistrationRequest, Role, SessionActions, SessionBackend, UserRecord,
};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Probe bound used by the tests; short so that hanging probes finish quickly
pub const TEST_PROBE_TIMEOUT_MS: u64 = 100;

/// What a scripted endpoint answers
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Rejected(String),
    NotFound,
    Unreachable,
    Hang,
}

impl<T: Clone + Send> Reply<T> {
    async fn play(self, endpoint: &str) -> CabResult<T> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Rejected(message) => Err(auth_error!(message, "scripted_backend", 401)),
            Reply::NotFound => Err(not_found_error!(endpoint, "scripted_backend")),
            Reply::Unreachable => Err(CabError::Network {
                message: "connection refused".to_string(),
                source: None,
                context: ErrorContext::new("scripted_backend"),
            }),
            Reply::Hang => std::future::pending::<CabResult<T>>().await,
        }
    }
}

struct Script {
    current_user: Reply<UserRecord>,
    customer_profile: Reply<Profile>,
    driver_profile: Reply<Profile>,
    login: Reply<()>,
    logout: Reply<()>,
    register: Reply<Value>,
    /// Session the server establishes on a successful login
    session_after_login: Option<UserRecord>,
    identity_delay_ms: u64,
    profile_delay_ms: u64,
}

/// Backend whose answers are set up by each test
pub struct ScriptedBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedBackend {
    /// No session, no profiles, every write endpoint succeeds
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                current_user: Reply::Rejected("Not authenticated".to_string()),
                customer_profile: Reply::NotFound,
                driver_profile: Reply::NotFound,
                login: Reply::Ok(()),
                logout: Reply::Ok(()),
                register: Reply::Ok(json!({"id": 1})),
                session_after_login: None,
                identity_delay_ms: 0,
                profile_delay_ms: 0,
            }),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A backend that already holds a session for `user`
    pub fn signed_in(user: UserRecord) -> Arc<Self> {
        let backend = Self::new();
        backend.set_current_user(Reply::Ok(user));
        backend
    }

    pub fn set_current_user(&self, reply: Reply<UserRecord>) {
        self.script.lock().unwrap().current_user = reply;
    }

    pub fn set_customer_profile(&self, reply: Reply<Profile>) {
        self.script.lock().unwrap().customer_profile = reply;
    }

    pub fn set_driver_profile(&self, reply: Reply<Profile>) {
        self.script.lock().unwrap().driver_profile = reply;
    }

    pub fn set_login(&self, reply: Reply<()>) {
        self.script.lock().unwrap().login = reply;
    }

    pub fn set_logout(&self, reply: Reply<()>) {
        self.script.lock().unwrap().logout = reply;
    }

    pub fn set_register(&self, reply: Reply<Value>) {
        self.script.lock().unwrap().register = reply;
    }

    /// Make a successful login establish a session for `user`
    pub fn accept_login_as(&self, user: UserRecord) {
        self.script.lock().unwrap().session_after_login = Some(user);
    }

    /// Delay every identity probe
    pub fn delay_identity(&self, delay_ms: u64) {
        self.script.lock().unwrap().identity_delay_ms = delay_ms;
    }

    /// Delay every profile probe
    pub fn delay_profile(&self, delay_ms: u64) {
        self.script.lock().unwrap().profile_delay_ms = delay_ms;
    }

    /// Endpoints called so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|call| **call == endpoint).count()
    }

    fn record(&self, endpoint: &'static str) {
        self.calls.lock().unwrap().push(endpoint);
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn current_user(&self) -> CabResult<UserRecord> {
        self.record("current_user");
        let (reply, delay_ms) = {
            let script = self.script.lock().unwrap();
            (script.current_user.clone(), script.identity_delay_ms)
        };
        pause(delay_ms).await;
        reply.play("/auth/me").await
    }

    async fn customer_profile(&self) -> CabResult<Profile> {
        self.record("customer_profile");
        let (reply, delay_ms) = {
            let script = self.script.lock().unwrap();
            (script.customer_profile.clone(), script.profile_delay_ms)
        };
        pause(delay_ms).await;
        reply.play("/customer/me").await
    }

    async fn driver_profile(&self) -> CabResult<Profile> {
        self.record("driver_profile");
        let (reply, delay_ms) = {
            let script = self.script.lock().unwrap();
            (script.driver_profile.clone(), script.profile_delay_ms)
        };
        pause(delay_ms).await;
        reply.play("/driver/me").await
    }

    async fn login(&self, _credentials: &Credentials) -> CabResult<()> {
        self.record("login");
        let reply = self.script.lock().unwrap().login.clone();
        reply.play("/auth/login").await?;

        let mut script = self.script.lock().unwrap();
        if let Some(user) = script.session_after_login.clone() {
            script.current_user = Reply::Ok(user);
        }
        Ok(())
    }

    async fn logout(&self) -> CabResult<()> {
        self.record("logout");
        let reply = self.script.lock().unwrap().logout.clone();
        reply.play("/auth/logout").await?;
        self.script.lock().unwrap().current_user =
            Reply::Rejected("Not authenticated".to_string());
        Ok(())
    }

    async fn register(&self, _request: &RegistrationRequest) -> CabResult<Value> {
        self.record("register");
        let reply = self.script.lock().unwrap().register.clone();
        reply.play("/auth/signup").await
    }
}

async fn pause(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

pub fn user(role: Role) -> UserRecord {
    UserRecord {
        role,
        name: format!("{} user", role),
        email: format!("{}@example.com", role.to_string().to_lowercase()),
        extra: Map::new(),
    }
}

pub fn profile() -> Profile {
    Profile(json!({"id": 42, "phone": "555-0100"}))
}

/// Session actions over `backend` with a short probe timeout
pub fn actions(backend: &Arc<ScriptedBackend>) -> SessionActions {
    SessionActions::with_backend(backend.clone(), TEST_PROBE_TIMEOUT_MS)
}

/// Session actions whose probes outlast the scripted delays
pub fn patient_actions(backend: &Arc<ScriptedBackend>) -> SessionActions {
    SessionActions::with_backend(backend.clone(), 5_000)
}
