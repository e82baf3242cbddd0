//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::LocalStorage;
use crate::app::RecordsApp;
use crate::config::Config;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<RecordsApp>,
    pub config: Arc<Config>,
    /// Set when documents live on local disk; serves the signed `/files` links.
    pub file_server: Option<Arc<LocalStorage>>,
}
