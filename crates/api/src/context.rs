use courseware_auth::Actor;

/// Actor context for a request.
///
/// Inserted by the auth middleware on every request; anonymous when no bearer
/// token was sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
}

impl ActorContext {
    pub fn new(actor: Actor) -> Self {
        Self { actor }
    }

    pub fn anonymous() -> Self {
        Self::new(Actor::Anonymous)
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}
