//! Patient-side queue workflow: sign in, pick medications, take a ticket,
//! watch its position and leave.

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod poller;
pub mod selection;
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::QueueBackend;
pub use config::ClientConfig;
pub use error::QueueError;
pub use http::HttpBackend;
pub use poller::{PollState, QueueSnapshot, StatusPoller};
pub use selection::MedicationSelection;
pub use session::{QueueSession, SessionState};
