use crate::{
    bidir::connection::Role,
    error::{OrbError, OrbResult},
};

/// Hands out the request identifiers of one side of a connection.
///
/// The initiator uses odd and the acceptor even identifiers, both stepping
/// by two. Identifiers increase monotonically and are never reused; once the
/// space is used up every further request is refused.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: Option<u32>,
}

impl RequestIdGenerator {
    pub fn new(role: Role) -> Self {
        let first = match role {
            Role::Initiator => 1,
            Role::Acceptor => 2,
        };
        Self { next: Some(first) }
    }

    pub fn next_id(&mut self) -> OrbResult<u32> {
        let id = self.next.ok_or_else(|| {
            OrbError::PreconditionNotMet("request identifiers exhausted".to_string())
        })?;
        self.next = id.checked_add(2);
        Ok(id)
    }
}
