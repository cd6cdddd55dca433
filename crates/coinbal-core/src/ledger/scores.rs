use tracing::info;

use super::Ledger;
use crate::actors::ActorRegistry;
use crate::error::{LedgerError, Result};
use crate::key::StateKey;
use crate::model::FinancialScores;
use crate::store;

impl Ledger<'_> {
    /// Stores the opening scores of an actor; called when the actor is registered.
    pub fn initialise_scores(&mut self, actor_id: &str, scores: FinancialScores) -> Result<()> {
        scores.validate()?;
        store::save(self.store_mut(), StateKey::scores(actor_id), &scores)?;
        info!(actor = actor_id, "financial scores initialised");
        Ok(())
    }

    pub fn update_scores(
        &mut self,
        actor_id: &str,
        scores: FinancialScores,
        actors: &dyn ActorRegistry,
    ) -> Result<()> {
        if !actors.actor_exists(actor_id)? {
            return Err(LedgerError::NotFound(format!(
                "actor {actor_id} is not registered"
            )));
        }
        scores.validate()?;
        store::save(self.store_mut(), StateKey::scores(actor_id), &scores)?;
        info!(
            actor = actor_id,
            trust = scores.trust_score,
            endorsement = scores.endorsement_score,
            "financial scores updated"
        );
        Ok(())
    }

    pub fn get_scores(&self, actor_id: &str) -> Result<FinancialScores> {
        store::load(self.store(), &StateKey::scores(actor_id))?.ok_or_else(|| {
            LedgerError::NotFound(format!("actor {actor_id} has no financial scores"))
        })
    }
}
