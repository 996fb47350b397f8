mod message;
mod selector;
mod store;

pub use message::{Message, Role, Session};
pub use selector::select_session;
pub use store::{Deletion, SessionStore, DEFAULT_SESSION};
