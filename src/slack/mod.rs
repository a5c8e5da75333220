mod api;
mod client;
mod direct;
mod router;
mod stream;
mod types;

pub use api::{
    ApiParams, ControlApi, DEFAULT_API_BASE_URL, HttpControlApi, encode_params, parse_response,
};
pub use client::{MessageSender, SlackClient};
pub use direct::DirectMessageOpener;
pub use router::MessageRouter;
pub use stream::{StreamEvent, StreamTransport, WsStreamTransport};
pub use types::{Delivery, PostOptions};
