pub mod dispatcher;
pub mod reader;
pub mod waiter;
