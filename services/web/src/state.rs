use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::{path::PathBuf, sync::Arc};

use crate::{
    air_quality::AirQualityClient, classifier::ImageClassifier, identity::IdentityGateway,
    repositories::BalanceStore,
};

/// Shared state for the web service
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn BalanceStore>,
    pub air_quality: AirQualityClient,
    pub classifier: ImageClassifier,
    pub identity: IdentityGateway,
    pub cookie_key: Key,
    pub upload_dir: PathBuf,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
