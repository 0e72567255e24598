/*!
 * The store module holds everything which touches persisted polls, answers,
 * votes and parameters
 */
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_polls(&self, filter: &PollFilter) -> Result<Vec<Poll>>;

    async fn find_poll(&self, name: &str) -> Result<Option<Poll>>;

    /**
     * Create the poll together with all of its answers
     *
     * Fails with `Error::Conflict` when a poll of the same name exists
     */
    async fn create_poll(&self, poll: InsertablePoll) -> Result<Poll>;

    /**
     * Delete the poll, its answers, votes and parameters.
     *
     * Returns false if there was nothing to delete
     */
    async fn delete_poll(&self, name: &str) -> Result<bool>;

    async fn answers(&self, poll_id: i32) -> Result<Vec<Answer>>;

    /**
     * Insert all votes or none of them
     */
    async fn create_votes(&self, votes: Vec<InsertableVote>) -> Result<Vec<Vote>>;

    /**
     * Flip `is_invalid` on every still-valid vote matching the filter,
     * returning how many rows were changed
     */
    async fn invalidate_votes(&self, which: &Invalidate) -> Result<u64>;

    /**
     * Count the valid votes of one sign for an answer
     */
    async fn count_votes(&self, answer_id: i32, sign: Sign) -> Result<i64>;

    /**
     * Votes across all answers of the poll, newest first
     */
    async fn find_votes(&self, poll_id: i32, filter: &VoteFilter) -> Result<Vec<Vote>>;

    async fn delete_vote(&self, poll_id: i32, id: Uuid) -> Result<bool>;

    async fn upsert_parameter(&self, poll_id: i32, key: &str, value: &str) -> Result<Parameter>;

    async fn find_parameter(&self, poll_id: i32, key: &str) -> Result<Option<Parameter>>;

    async fn list_parameters(
        &self,
        poll_id: i32,
        filter: &ParameterFilter,
    ) -> Result<Vec<Parameter>>;

    async fn delete_parameter(&self, poll_id: i32, key: &str) -> Result<bool>;

    async fn delete_parameters(&self, poll_id: i32) -> Result<u64>;
}
