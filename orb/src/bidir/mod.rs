//! Bidirectional request routing.
//!
//! A [`router::BidirRouter`] owns one established connection. Requests may
//! originate on either end; a reference received over the connection is
//! bound to it and invoking it reuses that connection.

pub mod connection;
pub mod message;
pub mod naming;
mod oneshot;
pub mod request_id;
pub mod router;
