pub mod conversations;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod state;
