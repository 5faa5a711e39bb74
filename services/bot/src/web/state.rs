//! services/bot/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::session::SessionStore;
use lifeline_core::{
    ports::{ChatChannel, Clock, IntentParser, Repositories},
    OccurrenceAdvancer, SchedulerHandle,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub advancer: OccurrenceAdvancer,
    /// Replies, edits and button answers.
    pub chat: Arc<dyn ChatChannel>,
    /// `None` when no AI key is configured; free text then gets a hint instead.
    pub intents: Option<Arc<dyn IntentParser>>,
    pub sessions: Arc<SessionStore>,
    pub scheduler: SchedulerHandle,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}
