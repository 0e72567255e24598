/*!
 * The votes module manages the lifecycle of a vote: casting, expiring,
 * resetting and deleting
 */
use chrono::{DateTime, Utc};
use log::*;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Invalidate, InsertableVote, Poll, Vote, VoteFilter};
use crate::store::Store;

/**
 * A single vote a client asked to cast
 */
#[derive(Clone, Debug)]
pub struct CastVote {
    pub answer: String,
    pub value: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub voter: Option<String>,
}

pub fn validate_value(value: i32, answer: &str) -> Result<()> {
    if value != 1 && value != -1 {
        return Err(Error::Validation(format!(
            "counter {} for answer {} can be either 1 or -1",
            value, answer
        )));
    }
    Ok(())
}

async fn require_poll(store: &dyn Store, name: &str) -> Result<Poll> {
    store
        .find_poll(name)
        .await?
        .ok_or_else(|| Error::not_found("poll", name))
}

/**
 * Cast a batch of votes into the poll
 *
 * Every vote is checked before anything is written, so a single bad entry
 * rejects the whole batch
 */
pub async fn cast_votes(store: &dyn Store, poll: &Poll, votes: Vec<CastVote>) -> Result<Vec<Vote>> {
    let answers = store.answers(poll.id).await?;
    let mut insertable = Vec::with_capacity(votes.len());

    for vote in votes {
        let answer = answers.iter().find(|a| a.name == vote.answer).ok_or_else(|| {
            Error::Validation(format!(
                "answer {} does not exist in poll {}",
                vote.answer, poll.name
            ))
        })?;
        validate_value(vote.value, &vote.answer)?;

        insertable.push(InsertableVote {
            answer_id: answer.id,
            value: vote.value,
            valid_until: vote.valid_until,
            voter: vote.voter,
        });
    }

    let created = store.create_votes(insertable).await?;
    info!("Recorded {} votes in poll {}", created.len(), poll.name);
    Ok(created)
}

/**
 * Invalidate every vote which expired before `now`
 */
pub async fn sweep_expired(store: &dyn Store, now: DateTime<Utc>) -> Result<u64> {
    let count = store
        .invalidate_votes(&Invalidate::ExpiredBefore(now))
        .await?;

    if count > 0 {
        info!("Cleaned up {} expired votes", count);
    } else {
        debug!("Cleaned up {} expired votes", count);
    }
    Ok(count)
}

/**
 * Sweep ahead of a read which depends on tallies.
 *
 * A failing sweep must not fail the read, the read just sees votes which
 * the next sweep will catch
 */
pub async fn refresh(store: &dyn Store) {
    if let Err(err) = sweep_expired(store, Utc::now()).await {
        error!("Failed to sweep expired votes: {:?}", err);
    }
}

/**
 * Invalidate all votes of the named answers, names which are not part of
 * the poll are ignored
 */
pub async fn reset_answers(store: &dyn Store, poll: &Poll, answer_names: &[String]) -> Result<u64> {
    let ids: Vec<i32> = store
        .answers(poll.id)
        .await?
        .into_iter()
        .filter(|a| answer_names.contains(&a.name))
        .map(|a| a.id)
        .collect();

    if ids.is_empty() {
        return Ok(0);
    }

    let count = store.invalidate_votes(&Invalidate::Answers(ids)).await?;
    info!("Reset {} votes in poll {}", count, poll.name);
    Ok(count)
}

pub async fn delete_vote(store: &dyn Store, poll_name: &str, id: Uuid) -> Result<()> {
    let poll = require_poll(store, poll_name).await?;
    if !store.delete_vote(poll.id, id).await? {
        return Err(Error::not_found("vote", &id.to_string()));
    }
    debug!("Deleted vote {} from poll {}", id, poll_name);
    Ok(())
}

/**
 * Votes across all answers of the poll, newest first
 */
pub async fn list_votes(store: &dyn Store, poll_name: &str, filter: &VoteFilter) -> Result<Vec<Vote>> {
    let poll = require_poll(store, poll_name).await?;
    store.find_votes(poll.id, filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InsertablePoll;
    use crate::store::MemoryStore;
    use crate::tally;
    use chrono::Duration;

    async fn color_poll(store: &MemoryStore) -> Poll {
        store
            .create_poll(InsertablePoll {
                name: "color".into(),
                question: "Favourite color?".into(),
                answers: vec!["red".into(), "blue".into()],
            })
            .await
            .expect("Failed to create poll")
    }

    fn cast(answer: &str, value: i32) -> CastVote {
        CastVote {
            answer: answer.into(),
            value,
            valid_until: None,
            voter: None,
        }
    }

    async fn vote_count(store: &MemoryStore, poll: &Poll) -> usize {
        store
            .find_votes(poll.id, &VoteFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[async_std::test]
    async fn test_cast_rejects_other_magnitudes() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;

        for value in &[0, 2, -2, 100] {
            let result = cast_votes(&store, &poll, vec![cast("red", *value)]).await;
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert_eq!(vote_count(&store, &poll).await, 0);
    }

    #[async_std::test]
    async fn test_cast_unknown_answer() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;

        let result = cast_votes(&store, &poll, vec![cast("green", 1)]).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(vote_count(&store, &poll).await, 0);
    }

    #[async_std::test]
    async fn test_unknown_poll() {
        let store = MemoryStore::new();
        let result = list_votes(&store, "nope", &VoteFilter::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        let result = delete_vote(&store, "nope", Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[async_std::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;

        let result = cast_votes(&store, &poll, vec![cast("red", 1), cast("blue", 5)]).await;
        assert!(result.is_err());
        assert_eq!(vote_count(&store, &poll).await, 0);
    }

    #[async_std::test]
    async fn test_sweep_is_idempotent() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let mut expired = cast("red", 1);
        expired.valid_until = Some(Utc::now() - Duration::minutes(5));
        let mut lasting = cast("red", 1);
        lasting.valid_until = Some(Utc::now() + Duration::days(1));
        cast_votes(&store, &poll, vec![expired, lasting, cast("blue", 1)])
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(sweep_expired(&store, now).await.unwrap(), 1);
        assert_eq!(sweep_expired(&store, now).await.unwrap(), 0);
    }

    #[async_std::test]
    async fn test_sweep_excludes_expired_from_tally() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let mut expired = cast("red", 1);
        expired.valid_until = Some(Utc::now() - Duration::seconds(1));
        cast_votes(&store, &poll, vec![expired]).await.unwrap();

        let red = store.answers(poll.id).await.unwrap()[0].id;
        assert_eq!(tally::compute_tally(&store, red).await.unwrap(), 1);

        sweep_expired(&store, Utc::now()).await.unwrap();
        assert_eq!(tally::compute_tally(&store, red).await.unwrap(), 0);
    }

    #[async_std::test]
    async fn test_reset_answers() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        cast_votes(
            &store,
            &poll,
            vec![cast("red", 1), cast("red", 1), cast("blue", -1)],
        )
        .await
        .unwrap();

        let count = reset_answers(&store, &poll, &["red".to_string(), "green".to_string()])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let answers = store.answers(poll.id).await.unwrap();
        assert_eq!(tally::compute_tally(&store, answers[0].id).await.unwrap(), 0);
        assert_eq!(tally::compute_tally(&store, answers[1].id).await.unwrap(), -1);

        /*
         * History is kept, only flagged
         */
        assert_eq!(vote_count(&store, &poll).await, 3);
    }

    #[async_std::test]
    async fn test_delete_vote() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let vote = cast_votes(&store, &poll, vec![cast("red", 1)]).await.unwrap().remove(0);

        delete_vote(&store, "color", vote.id).await.unwrap();
        let again = delete_vote(&store, "color", vote.id).await;
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[async_std::test]
    async fn test_list_votes_newest_first_with_limit() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let mut mine = cast("red", 1);
        mine.voter = Some("alice".into());
        let first = cast_votes(&store, &poll, vec![mine.clone()]).await.unwrap().remove(0);
        cast_votes(&store, &poll, vec![cast("blue", 1)]).await.unwrap();
        mine.answer = "blue".into();
        let last = cast_votes(&store, &poll, vec![mine]).await.unwrap().remove(0);

        let filter = VoteFilter {
            voter: Some("alice".into()),
            ..Default::default()
        };
        let votes = list_votes(&store, "color", &filter).await.unwrap();
        let ids: Vec<Uuid> = votes.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![last.id, first.id]);

        let filter = VoteFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(list_votes(&store, "color", &filter).await.unwrap().len(), 1);
    }

    #[async_std::test]
    async fn test_list_votes_created_after() {
        let store = MemoryStore::new();
        let poll = color_poll(&store).await;
        let first = cast_votes(&store, &poll, vec![cast("red", 1)]).await.unwrap().remove(0);
        async_std::task::sleep(std::time::Duration::from_millis(5)).await;
        let second = cast_votes(&store, &poll, vec![cast("blue", 1)]).await.unwrap().remove(0);

        let filter = VoteFilter {
            created_after: Some(first.created_at),
            ..Default::default()
        };
        let ids: Vec<Uuid> = list_votes(&store, "color", &filter)
            .await
            .unwrap()
            .iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![second.id]);
    }
}
