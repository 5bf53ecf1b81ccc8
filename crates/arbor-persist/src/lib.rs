//! Branching message-tree persistence.
//!
//! A [`Thread`] owns an immutable tree of [`Message`]s. Any message can be
//! turned into a linear conversational context with
//! [`MessageRepository::get_messages`].

pub mod branch;
pub mod error;
pub mod memory;
pub mod models;
pub mod repository;

#[cfg(feature = "mongodb")]
pub mod dbs;

pub use error::{PersistError, Result};
pub use memory::InMemoryRepository;
pub use models::{Message, NewMessage, Role, Thread};
pub use repository::MessageRepository;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoRepository;
