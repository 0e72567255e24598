use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Poll, Sign};
use crate::store::Store;

/**
 * Net count of the valid votes cast for one answer
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerTally {
    pub answer: String,
    pub counter: i64,
}

/**
 * Positive votes minus negative votes, ignoring anything invalidated
 *
 * Callers sweep expired votes beforehand
 */
pub async fn compute_tally(store: &dyn Store, answer_id: i32) -> Result<i64> {
    let positive = store.count_votes(answer_id, Sign::Positive).await?;
    let negative = store.count_votes(answer_id, Sign::Negative).await?;
    Ok(positive - negative)
}

/**
 * Tally every answer of the poll, at most `concurrency` answers at a time.
 *
 * The result follows the order the answers were created in
 */
pub async fn compute_poll_tally(
    store: &dyn Store,
    poll: &Poll,
    concurrency: usize,
) -> Result<Vec<AnswerTally>> {
    let answers = store.answers(poll.id).await?;

    stream::iter(answers)
        .map(|answer| async move {
            let counter = compute_tally(store, answer.id).await?;
            Ok::<_, Error>(AnswerTally {
                answer: answer.name,
                counter,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}
