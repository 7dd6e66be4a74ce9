//! Kalpataru Client crate - outbound requests to the assistant backend.
//!
//! Provides the `Backend` seam with its reqwest implementation, request
//! cancellation tokens, file attachments, and the `RequestChannel` that races
//! every call against its token and a timeout.

pub mod attachment;
pub mod backend;
pub mod channel;
pub mod error;
pub mod token;

pub use attachment::Attachment;
pub use backend::{Backend, ChatRequest, HttpBackend};
pub use channel::RequestChannel;
pub use error::RequestError;
pub use token::RequestToken;
