#![doc = include_str!("../README.md")]

/// Dynamic IDL values: type descriptors, the `Any` container and typed payload mapping.
pub mod xtypes;

pub mod cdr;

/// Session wide settings.
pub mod configuration;

/// Error types.
pub mod error;

/// Object references and the connection identity they are bound to.
pub mod reference;

#[cfg(feature = "bidir")]
pub mod bidir;

/// Explicit ORB context owning the attached connections.
#[cfg(feature = "bidir")]
pub mod orb;

pub use cdr::CdrCodec;
pub use error::{OrbError, OrbResult};
pub use xtypes::{dynamic_value::DynamicValue, type_support::TypeSupport};
