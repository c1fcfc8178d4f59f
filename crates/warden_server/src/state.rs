//! Application state

use std::sync::Arc;

use warden_auth::Authenticator;
use warden_db::WardenDb;

use crate::{config::ServerConfig, error::ServerResult};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub auth: Authenticator,
}

impl AppState {
    pub fn new(config: ServerConfig, db: WardenDb) -> ServerResult<Self> {
        config.validate()?;
        let auth = Authenticator::new(db, config.auth_config()?)?;

        Ok(Self {
            config: Arc::new(config),
            auth,
        })
    }

    pub fn db(&self) -> &WardenDb {
        self.auth.db()
    }
}
