use std::sync::Arc;
use std::time::Duration;

use chatdesk_db::Database;
use chatdesk_gateway::dispatcher::Dispatcher;
use chatdesk_gateway::reader::SqliteReader;
use chatdesk_gateway::waiter::{WaitConfig, Waiter};

pub type AppState = Arc<AppStateInner>;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Re-check a conversation token against the caller's fingerprint on
    /// send and poll. Off by default: the token alone is the capability.
    pub require_fingerprint: bool,
    /// How far back `conversations/live` looks.
    pub live_window: Duration,
    pub wait: WaitConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            require_fingerprint: false,
            live_window: Duration::from_secs(3600),
            wait: WaitConfig::default(),
        }
    }
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub waiter: Waiter<SqliteReader>,
    pub settings: Settings,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, settings: Settings) -> AppState {
        let dispatcher = Dispatcher::new();
        let waiter = Waiter::new(
            Arc::new(SqliteReader::new(db.clone())),
            dispatcher.clone(),
            settings.wait,
        );

        Arc::new(Self {
            db,
            dispatcher,
            waiter,
            settings,
        })
    }
}
