use async_std::sync::RwLock;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::Store;

#[derive(Debug, Default)]
struct Tables {
    next_id: i32,
    polls: Vec<Poll>,
    answers: Vec<Answer>,
    votes: Vec<Vote>,
    params: Vec<Parameter>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn answer_ids(&self, poll_id: i32) -> Vec<i32> {
        self.answers
            .iter()
            .filter(|a| a.poll_id == poll_id)
            .map(|a| a.id)
            .collect()
    }
}

/**
 * Store keeping everything in process memory
 *
 * Nothing survives a restart, this exists for running without a database and
 * for the test suite
 */
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_polls(&self, filter: &PollFilter) -> Result<Vec<Poll>> {
        let tables = self.tables.read().await;
        Ok(tables
            .polls
            .iter()
            .filter(|poll| {
                filter.is_empty()
                    || tables
                        .params
                        .iter()
                        .any(|p| p.poll_id == poll.id && filter.matches(p))
            })
            .cloned()
            .collect())
    }

    async fn find_poll(&self, name: &str) -> Result<Option<Poll>> {
        let tables = self.tables.read().await;
        Ok(tables.polls.iter().find(|p| p.name == name).cloned())
    }

    async fn create_poll(&self, poll: InsertablePoll) -> Result<Poll> {
        let mut tables = self.tables.write().await;
        if tables.polls.iter().any(|p| p.name == poll.name) {
            return Err(Error::Conflict(format!("poll {} already exists", poll.name)));
        }

        let created = Poll {
            id: tables.next_id(),
            name: poll.name,
            question: poll.question,
            created_at: Utc::now(),
        };
        for name in poll.answers {
            let answer = Answer {
                id: tables.next_id(),
                poll_id: created.id,
                name,
            };
            tables.answers.push(answer);
        }
        tables.polls.push(created.clone());
        Ok(created)
    }

    async fn delete_poll(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let poll_id = match tables.polls.iter().find(|p| p.name == name) {
            Some(poll) => poll.id,
            None => return Ok(false),
        };

        let answers = tables.answer_ids(poll_id);
        tables.polls.retain(|p| p.id != poll_id);
        tables.answers.retain(|a| a.poll_id != poll_id);
        tables.votes.retain(|v| !answers.contains(&v.answer_id));
        tables.params.retain(|p| p.poll_id != poll_id);
        Ok(true)
    }

    async fn answers(&self, poll_id: i32) -> Result<Vec<Answer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .answers
            .iter()
            .filter(|a| a.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn create_votes(&self, votes: Vec<InsertableVote>) -> Result<Vec<Vote>> {
        let mut tables = self.tables.write().await;

        let mut created = Vec::with_capacity(votes.len());
        for vote in votes {
            let answer = tables
                .answers
                .iter()
                .find(|a| a.id == vote.answer_id)
                .ok_or_else(|| Error::NotFound(format!("answer {} does not exist", vote.answer_id)))?;

            created.push(Vote {
                id: Uuid::new_v4(),
                answer_id: answer.id,
                answer: answer.name.clone(),
                value: vote.value,
                valid_until: vote.valid_until,
                is_invalid: false,
                voter: vote.voter,
                created_at: Utc::now(),
            });
        }

        tables.votes.extend(created.iter().cloned());
        Ok(created)
    }

    async fn invalidate_votes(&self, which: &Invalidate) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;

        for vote in tables.votes.iter_mut().filter(|v| !v.is_invalid) {
            let matched = match which {
                Invalidate::ExpiredBefore(now) => vote.valid_until.map_or(false, |t| t < *now),
                Invalidate::Answers(ids) => ids.contains(&vote.answer_id),
            };
            if matched {
                vote.is_invalid = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_votes(&self, answer_id: i32, sign: Sign) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.answer_id == answer_id && !v.is_invalid && sign.matches(v.value))
            .count() as i64)
    }

    async fn find_votes(&self, poll_id: i32, filter: &VoteFilter) -> Result<Vec<Vote>> {
        let tables = self.tables.read().await;
        let answers = tables.answer_ids(poll_id);

        let mut votes: Vec<Vote> = tables
            .votes
            .iter()
            .filter(|v| answers.contains(&v.answer_id) && filter.matches(v))
            .cloned()
            .collect();

        /*
         * Votes are appended in creation order, reversing first keeps equal
         * timestamps newest-first through the stable sort
         */
        votes.reverse();
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            votes.truncate(limit.max(0) as usize);
        }
        Ok(votes)
    }

    async fn delete_vote(&self, poll_id: i32, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let answers = tables.answer_ids(poll_id);
        let before = tables.votes.len();
        tables
            .votes
            .retain(|v| !(v.id == id && answers.contains(&v.answer_id)));
        Ok(tables.votes.len() < before)
    }

    async fn upsert_parameter(&self, poll_id: i32, key: &str, value: &str) -> Result<Parameter> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .params
            .iter_mut()
            .find(|p| p.poll_id == poll_id && p.key == key)
        {
            existing.value = value.to_string();
            return Ok(existing.clone());
        }

        let param = Parameter {
            poll_id,
            key: key.to_string(),
            value: value.to_string(),
        };
        tables.params.push(param.clone());
        Ok(param)
    }

    async fn find_parameter(&self, poll_id: i32, key: &str) -> Result<Option<Parameter>> {
        let tables = self.tables.read().await;
        Ok(tables
            .params
            .iter()
            .find(|p| p.poll_id == poll_id && p.key == key)
            .cloned())
    }

    async fn list_parameters(
        &self,
        poll_id: i32,
        filter: &ParameterFilter,
    ) -> Result<Vec<Parameter>> {
        let tables = self.tables.read().await;
        let mut params: Vec<Parameter> = tables
            .params
            .iter()
            .filter(|p| p.poll_id == poll_id && filter.matches(p))
            .cloned()
            .collect();

        match filter.order_by {
            Some(ParameterOrder::KeyAsc) => params.sort_by(|a, b| a.key.cmp(&b.key)),
            Some(ParameterOrder::KeyDesc) => params.sort_by(|a, b| b.key.cmp(&a.key)),
            Some(ParameterOrder::ValueAsc) => params.sort_by(|a, b| a.value.cmp(&b.value)),
            Some(ParameterOrder::ValueDesc) => params.sort_by(|a, b| b.value.cmp(&a.value)),
            None => {}
        }

        if let Some(first) = filter.first {
            params.truncate(first.max(0) as usize);
        }
        Ok(params)
    }

    async fn delete_parameter(&self, poll_id: i32, key: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.params.len();
        tables
            .params
            .retain(|p| !(p.poll_id == poll_id && p.key == key));
        Ok(tables.params.len() < before)
    }

    async fn delete_parameters(&self, poll_id: i32) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.params.len();
        tables.params.retain(|p| p.poll_id != poll_id);
        Ok((before - tables.params.len()) as u64)
    }
}
