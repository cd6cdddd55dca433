use std::collections::BTreeSet;

use crate::error::Result;

/// Synchronous view of the external actor/identity registry service.
pub trait ActorRegistry {
    fn actor_exists(&self, actor_id: &str) -> Result<bool>;
}

/// Actor registry backed by a fixed set of ids, for in-process hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryActorRegistry {
    actors: BTreeSet<String>,
}

impl InMemoryActorRegistry {
    pub fn new<I, S>(actors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actors: actors.into_iter().map(Into::into).collect(),
        }
    }
}

impl ActorRegistry for InMemoryActorRegistry {
    fn actor_exists(&self, actor_id: &str) -> Result<bool> {
        Ok(self.actors.contains(actor_id))
    }
}
