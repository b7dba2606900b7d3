use core::fmt;

/// Identity of the duplex channel a reference was received over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

/// Opaque key of an object within the object set addressable over a
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(Vec<u8>);

impl ObjectId {
    pub fn new(key: Vec<u8>) -> Self {
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for ObjectId {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// Typed reference to a remote object. A reference received over a
/// connection is bound to it for its whole life; invoking it reuses that
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    interface: String,
    object_id: ObjectId,
    connection_id: Option<ConnectionId>,
}

impl ObjectReference {
    /// A reference not yet bound to any connection, as handed out by a local
    /// activation layer.
    pub fn new(interface: impl Into<String>, object_id: impl Into<ObjectId>) -> Self {
        Self {
            interface: interface.into(),
            object_id: object_id.into(),
            connection_id: None,
        }
    }

    /// The reference designating no object. It is the zero value of every
    /// object reference type and cannot be invoked.
    pub fn nil() -> Self {
        Self::new("", ObjectId::new(Vec::new()))
    }

    pub fn is_nil(&self) -> bool {
        self.interface.is_empty() && self.object_id.as_bytes().is_empty()
    }

    pub fn bound(
        interface: impl Into<String>,
        object_id: impl Into<ObjectId>,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            interface: interface.into(),
            object_id: object_id.into(),
            connection_id: Some(connection_id),
        }
    }

    /// A copy of this reference bound to another connection. The receiver
    /// keeps its own binding.
    pub fn rebound_to(&self, connection_id: ConnectionId) -> Self {
        Self {
            interface: self.interface.clone(),
            object_id: self.object_id.clone(),
            connection_id: Some(connection_id),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_leaves_the_original_untouched() {
        let original = ObjectReference::bound("IDL:Callback:1.0", "cb", ConnectionId::new(1));
        let copy = original.rebound_to(ConnectionId::new(2));
        assert_eq!(original.connection_id(), Some(ConnectionId::new(1)));
        assert_eq!(copy.connection_id(), Some(ConnectionId::new(2)));
        assert_eq!(copy.object_id(), original.object_id());
    }

    #[test]
    fn nil_reference() {
        assert!(ObjectReference::nil().is_nil());
        assert_eq!(ObjectReference::nil().connection_id(), None);
        assert!(!ObjectReference::new("Callback", "cb").is_nil());
    }
}
