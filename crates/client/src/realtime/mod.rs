//! Realtime session channel.
//!
//! A [`RealtimeChannel`] holds one connection to the broker, authenticated by
//! user and session id. Emitters are fire-and-forget; listeners are registered
//! per event and removed through the returned [`Subscription`]. Dropped links
//! are retried a fixed number of times before the channel settles in
//! [`ConnectionState::Failed`].
//!
//! ```no_run
//! # async fn demo() {
//! use speakspace_client::config::ClientConfig;
//! use speakspace_client::realtime::RealtimeChannel;
//!
//! let channel = RealtimeChannel::new(&ClientConfig::default());
//! let sub = channel.on_message(|m| println!("{}: {}", m.sender_id, m.content));
//! channel.connect("1", "weekly-sync");
//! channel.join_session("weekly-sync");
//! // ...
//! sub.unsubscribe();
//! channel.disconnect();
//! # }
//! ```

mod channel;
mod connection;
mod listeners;
#[cfg(test)]
pub(crate) mod testing;

pub use channel::RealtimeChannel;
pub use connection::{
    ConnectionState, Connector, ReconnectConfig, TransportError, TransportLink,
    TungsteniteConnector,
};
pub use listeners::Subscription;
