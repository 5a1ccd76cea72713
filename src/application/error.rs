use thiserror::Error;

use crate::{
    cache::ErrorInfo, config::LoadError, domain::error::DomainError, infra::error::InfraError,
    infra::transport::ClientError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("request failed: {0}")]
    Query(ErrorInfo),
    #[error("not signed in; run `login <email>` first")]
    Unauthenticated,
}

impl From<ErrorInfo> for AppError {
    fn from(info: ErrorInfo) -> Self {
        Self::Query(info)
    }
}
