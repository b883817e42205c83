//! # sensorlink-protocol
//!
//! SensorLink wire payloads and codec.
//!
//! This crate defines the WebSocket frames pushed to viewers, the JSON
//! documents returned by the HTTP API, and decoding of the form bodies and
//! query strings the configuration endpoints accept.

pub mod codec;
pub mod form;
pub mod messages;

pub use codec::{decode_sample, encode_sample, encode_status, CodecError};
pub use form::{CredentialsForm, FormBody, FormError, Ipv4Form, LedCommand};
pub use messages::*;
