use std::collections::HashSet;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Poll, VoteFilter};
use crate::store::Store;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VoterStats {
    /**
     * Distinct voters who ever voted in the poll
     */
    pub voters: usize,
    /**
     * Distinct voters with at least one vote which still counts
     */
    pub active_voters: usize,
}

/**
 * Count distinct voter identifiers for the poll.
 *
 * Anonymous votes are not counted at all.
 */
pub async fn compute_voter_stats(store: &dyn Store, poll: &Poll) -> Result<VoterStats> {
    // TODO: this loads every tagged vote of the poll, push the DISTINCT count into the store
    let filter = VoteFilter {
        has_voter: true,
        ..Default::default()
    };
    let votes = store.find_votes(poll.id, &filter).await?;

    let mut voters = HashSet::new();
    let mut active = HashSet::new();
    for vote in votes.iter() {
        if let Some(voter) = &vote.voter {
            voters.insert(voter.as_str());
            if !vote.is_invalid {
                active.insert(voter.as_str());
            }
        }
    }

    Ok(VoterStats {
        voters: voters.len(),
        active_voters: active.len(),
    })
}
