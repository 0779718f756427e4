//! Domain logic of the Agora client, independent of the browser.

pub mod alerts;
pub mod backend;
pub mod chat;
pub mod error;
pub mod forms;
pub mod models;
pub mod realtime;
pub mod rest;
pub mod session;
pub mod state;
pub mod thread;

#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use error::{AuthError, BackendError, FormErrors, MessengerError};
pub use models::{Forum, Message, Profile, User, ViewMode};
pub use state::{Messenger, ViewCell, ViewState};
