//! Transport to the remote sync peer
//!
//! Two transport modes: stateless request/response calls ([`HttpTransport`])
//! and an optional persistent push channel ([`PushChannel`]) for realtime
//! remote-change notifications. Reconnection backoff lives here too.

pub mod backoff;
pub mod errors;
pub mod http;
pub mod messages;
pub mod push;

pub use backoff::{Backoff, BackoffPolicy};
pub use errors::{Result, TransportError};
pub use http::{HttpTransport, Transport, ENCODING_HEADER};
pub use messages::{
    ChangeSignature, CheckResponse, ChunkInfo, ConflictKind, PayloadEncoding, PushMessage,
    RemoteConflict, TransferPayload,
};
pub use push::{ChannelEvent, ChannelState, PushChannel, PushChannelConfig};
