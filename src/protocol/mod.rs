//! Wire Protocol
//!
//! JSON shapes shared by the server and the clients: broadcast envelopes,
//! stream events, publish bodies, API responses, and the event-stream decoder.

pub mod api;
pub mod envelope;
pub mod sse;

pub use envelope::{BroadcastEnvelope, EnvelopePayload, ServerEvent, UpdateRequest};
pub use sse::{decode_event, SseDecoder};
