//! Auth session, credential persistence and route guarding.

use std::sync::{Arc, PoisonError, RwLock};

use catalog_api_types::{AuthResponse, LoginRequest};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::{EventKind, InvalidationPlan, ResourceCache};
use crate::infra::error::InfraError;
use crate::infra::transport::{ClientError, Transport, decode};

use super::error::AppError;
use super::validation::validate_email;

const AUTH_PATH: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub email: String,
}

/// Key-value storage for `token` and `email` that survives restarts.
pub trait CredentialStore: Send + Sync {
    /// `None` unless both keys are present.
    fn load(&self) -> Result<Option<Credentials>, InfraError>;

    fn save(&self, credentials: &Credentials) -> Result<(), InfraError>;

    fn clear(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    #[serde(skip_serializing)]
    token: Option<String>,
    email: Option<String>,
}

impl AuthSession {
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            token: Some(credentials.token),
            email: Some(credentials.email),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.email.is_some()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Owns the session and keeps the transport token and store in step with it.
pub struct AuthService {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    cache: Arc<ResourceCache>,
    session: RwLock<AuthSession>,
}

impl AuthService {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        cache: Arc<ResourceCache>,
    ) -> Self {
        Self {
            transport,
            store,
            cache,
            session: RwLock::new(AuthSession::default()),
        }
    }

    pub fn session(&self) -> AuthSession {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Seed the session from the store. Run once at startup.
    pub fn restore(&self) -> Result<AuthSession, InfraError> {
        let session = self
            .store
            .load()?
            .map(AuthSession::from_credentials)
            .unwrap_or_default();
        self.install(session.clone());
        Ok(session)
    }

    /// Exchange an email for a bearer token.
    ///
    /// The email is checked locally first; an invalid one never reaches
    /// the network.
    pub async fn login(&self, email: &str) -> Result<AuthSession, AppError> {
        validate_email(email)?;
        let email = email.trim().to_string();

        let body = serde_json::to_value(LoginRequest {
            email: email.clone(),
        })
        .map_err(|err| ClientError::Decode(err.to_string()))?;
        let value = self.transport.send(Method::POST, AUTH_PATH, Some(body)).await?;
        let AuthResponse { token } = decode(value)?;

        let credentials = Credentials { token, email };
        self.store.save(&credentials)?;
        self.reset_cache();
        let session = AuthSession::from_credentials(credentials);
        self.install(session.clone());
        info!(email = session.email(), "Signed in");
        Ok(session)
    }

    /// Forget the session in the store, then in the transport and cache.
    ///
    /// A failed store clear leaves the session signed in.
    pub fn logout(&self) -> Result<(), AppError> {
        let email = self.session().email().map(str::to_string);
        self.store.clear()?;
        self.install(AuthSession::default());
        self.reset_cache();
        info!(email, "Signed out");
        Ok(())
    }

    fn install(&self, session: AuthSession) {
        self.transport.set_token(session.token.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn reset_cache(&self) {
        self.cache
            .apply(&InvalidationPlan::from_kind(&EventKind::SessionEnded));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
    Products,
    ProductDetail(String),
    CreateProduct,
    EditProduct(String),
}

impl Route {
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Allow,
    Redirect(Route),
}

pub struct RouteGuard;

impl RouteGuard {
    pub fn resolve(route: &Route, session: &AuthSession) -> Guard {
        match (route.is_protected(), session.is_authenticated()) {
            (true, false) => Guard::Redirect(Route::Login),
            (false, true) => Guard::Redirect(Route::Products),
            _ => Guard::Allow,
        }
    }
}
