//! # Duebell Push
//!
//! Web Push delivery: VAPID-signed, aes128gcm-encrypted messages sent to the
//! endpoint a browser handed out when it subscribed.

pub mod transport;

pub use transport::WebPushTransport;
