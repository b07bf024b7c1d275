use std::sync::Arc;

use tracing::info;

use crate::{config::Config, error::AppError, store::SurveyStore};

pub struct AppState {
    pub config: Config,
    pub store: SurveyStore,
}

impl AppState {
    pub fn new() -> Result<Arc<Self>, AppError> {
        let config = Config::load();

        info!("Opening store at {}", config.database_path);
        let store = SurveyStore::open(&config.database_path)?;

        Ok(Arc::new(Self { config, store }))
    }
}
