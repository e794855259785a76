//! Answer Service Backends
//!
//! Abstraction over the upstream answer-generation service. The engine only
//! needs an opaque async call that takes a prompt plus projected history and
//! returns one complete reply; implementations handle transport details.

mod http;
mod traits;

pub use http::HttpAnswerBackend;
pub use traits::{
    AnswerBackend, AnswerReply, AnswerRequest, EncodedAttachment, SourceRef, Turn, UpstreamRole,
};
