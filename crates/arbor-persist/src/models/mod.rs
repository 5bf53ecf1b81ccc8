mod db_message;
mod db_thread;

// Export database-agnostic models
pub use db_message::{Message, NewMessage, Role};
pub use db_thread::Thread;
