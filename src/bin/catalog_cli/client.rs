#![deny(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use thiserror::Error;

use catalog_sync::application::auth::{AuthService, CredentialStore};
use catalog_sync::application::error::AppError;
use catalog_sync::application::executor::QueryExecutor;
use catalog_sync::application::mutations::MutationDispatcher;
use catalog_sync::cache::{CacheConfig, ResourceCache};
use catalog_sync::config::{LoadError, Settings};
use catalog_sync::infra::credentials::FileCredentialStore;
use catalog_sync::infra::error::InfraError;
use catalog_sync::infra::transport::{ApiClient, ClientError, Transport};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error("failed to render output: {0}")]
    Render(String),
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        Self::App(err.into())
    }
}

impl From<InfraError> for CliError {
    fn from(err: InfraError) -> Self {
        Self::App(err.into())
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        Self::App(err.into())
    }
}

/// Services shared by every command, wired to one cache.
pub struct Ctx {
    pub settings: Settings,
    pub executor: QueryExecutor,
    pub mutations: MutationDispatcher,
    pub auth: AuthService,
}

impl Ctx {
    pub fn from_settings(settings: Settings) -> Result<Self, CliError> {
        let transport: Arc<dyn Transport> = Arc::new(ApiClient::from_settings(&settings.api)?);
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&settings.credentials.path));
        Self::new(settings, transport, store)
    }

    /// Wire services and restore any stored session.
    pub fn new(
        settings: Settings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, CliError> {
        let cache = Arc::new(ResourceCache::new(CacheConfig::from(&settings.cache)));
        let executor = QueryExecutor::new(Arc::clone(&cache), Arc::clone(&transport));
        let mutations = MutationDispatcher::new(Arc::clone(&cache), Arc::clone(&transport));
        let auth = AuthService::new(transport, store, cache);
        auth.restore()?;
        Ok(Self {
            settings,
            executor,
            mutations,
            auth,
        })
    }

    /// Fail early for commands that need a token.
    pub fn require_session(&self) -> Result<(), CliError> {
        if self.auth.session().is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Unauthenticated.into())
        }
    }
}
