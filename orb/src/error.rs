use core::fmt;

/// Result type returned by every fallible operation of this crate.
pub type OrbResult<T> = Result<T, OrbError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrbError {
    /// The stored type is not assignable to the requested one.
    TypeMismatch { expected: String, found: String },
    /// A sequence holds (or announces) more elements than its bound allows.
    BoundViolation { bound: u32, length: usize },
    /// The input ended before the value was complete.
    UnexpectedEnd { needed: usize, remaining: usize },
    /// The discriminant selects no branch and the union declares no default.
    UnknownDiscriminant(i64),
    /// A recursive value is nested deeper than the configured limit.
    DepthExceeded(usize),
    /// Byte order or wide character width disagree between the peers.
    /// Fatal for the connection the message arrived on.
    EncodingMismatch(String),
    /// The connection closed before the correlated reply arrived.
    ConnectionLost,
    /// The bytes are well framed but do not hold a legal value.
    InvalidData(String),
    /// A type descriptor is malformed. Raised when the descriptor is built
    /// or compared, never while a value is being marshaled.
    InvalidDescriptor(String),
    /// The reference is bound to a different connection than the router it
    /// was given to.
    ForeignConnection,
    PreconditionNotMet(String),
}

impl fmt::Display for OrbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            OrbError::BoundViolation { bound, length } => {
                write!(f, "sequence of length {length} exceeds bound {bound}")
            }
            OrbError::UnexpectedEnd { needed, remaining } => write!(
                f,
                "unexpected end of input: needed {needed} bytes, {remaining} remaining"
            ),
            OrbError::UnknownDiscriminant(d) => {
                write!(f, "discriminant {d} selects no union branch")
            }
            OrbError::DepthExceeded(limit) => {
                write!(f, "value nesting exceeds the maximum depth of {limit}")
            }
            OrbError::EncodingMismatch(reason) => write!(f, "encoding mismatch: {reason}"),
            OrbError::ConnectionLost => write!(f, "connection lost"),
            OrbError::InvalidData(reason) => write!(f, "invalid data: {reason}"),
            OrbError::InvalidDescriptor(reason) => write!(f, "invalid type descriptor: {reason}"),
            OrbError::ForeignConnection => {
                write!(f, "reference is bound to a different connection")
            }
            OrbError::PreconditionNotMet(reason) => write!(f, "precondition not met: {reason}"),
        }
    }
}

impl std::error::Error for OrbError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_values() {
        let e = OrbError::BoundViolation {
            bound: 4,
            length: 5,
        };
        assert_eq!(e.to_string(), "sequence of length 5 exceeds bound 4");
        assert_eq!(
            OrbError::UnexpectedEnd {
                needed: 4,
                remaining: 1
            }
            .to_string(),
            "unexpected end of input: needed 4 bytes, 1 remaining"
        );
    }
}
