use async_trait::async_trait;
use log::*;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::Store;

const UNIQUE_VIOLATION: &str = "23505";

const VOTE_COLUMNS: &str = "v.id, v.answer_id, a.name AS answer, v.value, v.valid_until, \
                            v.is_invalid, v.voter, v.created_at";

/**
 * Store backed by PostgreSQL through sqlx
 */
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /**
     * Create the connection pool and bring the schema up to date
     */
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map_or(false, |code| code == UNIQUE_VIOLATION)
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_polls(&self, filter: &PollFilter) -> Result<Vec<Poll>> {
        if filter.is_empty() {
            return Ok(sqlx::query_as::<_, Poll>("SELECT * FROM polls ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?);
        }

        let polls = sqlx::query_as::<_, Poll>(
            "SELECT * FROM polls p WHERE EXISTS (
                SELECT 1 FROM params x WHERE x.poll_id = p.id
                AND ($1::text IS NULL OR x.key = $1)
                AND ($1::text IS NULL OR $2::text IS NULL OR x.value = $2)
            ) ORDER BY p.id ASC",
        )
        .bind(&filter.key)
        .bind(&filter.value)
        .fetch_all(&self.pool)
        .await?;
        Ok(polls)
    }

    async fn find_poll(&self, name: &str) -> Result<Option<Poll>> {
        Ok(sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_poll(&self, poll: InsertablePoll) -> Result<Poll> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Poll>(
            "INSERT INTO polls (name, question) VALUES ($1, $2) RETURNING *",
        )
        .bind(&poll.name)
        .bind(&poll.question)
        .fetch_one(&mut tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::Conflict(format!("poll {} already exists", poll.name))
            } else {
                Error::Store(err)
            }
        })?;

        /*
         * Answers go in one at a time so their serial ids follow the order
         * the client listed them in
         */
        for answer in poll.answers.iter() {
            sqlx::query("INSERT INTO answers (poll_id, name) VALUES ($1, $2)")
                .bind(created.id)
                .bind(answer)
                .execute(&mut tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Created poll: {:?}", created);
        Ok(created)
    }

    async fn delete_poll(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM polls WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn answers(&self, poll_id: i32) -> Result<Vec<Answer>> {
        Ok(sqlx::query_as::<_, Answer>(
            "SELECT id, poll_id, name FROM answers WHERE poll_id = $1 ORDER BY id ASC",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_votes(&self, votes: Vec<InsertableVote>) -> Result<Vec<Vote>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(votes.len());

        for vote in votes.iter() {
            let sql = format!(
                "WITH v AS (
                    INSERT INTO votes (id, answer_id, value, valid_until, voter)
                    VALUES ($1, $2, $3, $4, $5) RETURNING *
                ) SELECT {} FROM v JOIN answers a ON a.id = v.answer_id",
                VOTE_COLUMNS
            );
            let row = sqlx::query_as::<_, Vote>(&sql)
                .bind(Uuid::new_v4())
                .bind(vote.answer_id)
                .bind(vote.value)
                .bind(vote.valid_until)
                .bind(&vote.voter)
                .fetch_one(&mut tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn invalidate_votes(&self, which: &Invalidate) -> Result<u64> {
        let result = match which {
            Invalidate::ExpiredBefore(now) => {
                sqlx::query(
                    "UPDATE votes SET is_invalid = TRUE
                     WHERE is_invalid = FALSE AND valid_until < $1",
                )
                .bind(now)
                .execute(&self.pool)
                .await?
            }
            Invalidate::Answers(ids) => {
                sqlx::query(
                    "UPDATE votes SET is_invalid = TRUE
                     WHERE is_invalid = FALSE AND answer_id = ANY($1)",
                )
                .bind(ids)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn count_votes(&self, answer_id: i32, sign: Sign) -> Result<i64> {
        let sql = match sign {
            Sign::Positive => {
                "SELECT COUNT(*) FROM votes WHERE answer_id = $1 AND is_invalid = FALSE AND value > 0"
            }
            Sign::Negative => {
                "SELECT COUNT(*) FROM votes WHERE answer_id = $1 AND is_invalid = FALSE AND value < 0"
            }
        };
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(answer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_votes(&self, poll_id: i32, filter: &VoteFilter) -> Result<Vec<Vote>> {
        /*
         * LIMIT NULL is the same as no limit at all in PostgreSQL
         */
        let sql = format!(
            "SELECT {} FROM votes v JOIN answers a ON a.id = v.answer_id
             WHERE a.poll_id = $1
             AND ($2::text IS NULL OR v.voter = $2)
             AND (NOT $3 OR v.voter IS NOT NULL)
             AND ($4::timestamptz IS NULL OR v.created_at > $4)
             AND ($5::timestamptz IS NULL OR v.valid_until IS NULL OR v.valid_until >= $5)
             ORDER BY v.created_at DESC
             LIMIT $6",
            VOTE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Vote>(&sql)
            .bind(poll_id)
            .bind(&filter.voter)
            .bind(filter.has_voter)
            .bind(filter.created_after)
            .bind(filter.valid_on)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_vote(&self, poll_id: i32, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM votes v USING answers a
             WHERE v.answer_id = a.id AND a.poll_id = $1 AND v.id = $2",
        )
        .bind(poll_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_parameter(&self, poll_id: i32, key: &str, value: &str) -> Result<Parameter> {
        Ok(sqlx::query_as::<_, Parameter>(
            "INSERT INTO params (poll_id, key, value) VALUES ($1, $2, $3)
             ON CONFLICT (poll_id, key) DO UPDATE SET value = EXCLUDED.value
             RETURNING poll_id, key, value",
        )
        .bind(poll_id)
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_parameter(&self, poll_id: i32, key: &str) -> Result<Option<Parameter>> {
        Ok(sqlx::query_as::<_, Parameter>(
            "SELECT poll_id, key, value FROM params WHERE poll_id = $1 AND key = $2",
        )
        .bind(poll_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_parameters(
        &self,
        poll_id: i32,
        filter: &ParameterFilter,
    ) -> Result<Vec<Parameter>> {
        /*
         * Substring matching is done with strpos/left/right rather than LIKE
         * so that `%` and `_` in client input stay literal
         */
        let order = filter.order_by.map_or("id ASC", ParameterOrder::sql);
        let sql = format!(
            "SELECT poll_id, key, value FROM params
             WHERE poll_id = $1
             AND ($2::text IS NULL OR key = $2)
             AND ($3::text IS NULL OR strpos(key, $3) > 0)
             AND ($4::text IS NULL OR left(key, length($4)) = $4)
             AND ($5::text IS NULL OR right(key, length($5)) = $5)
             ORDER BY {}
             LIMIT $6",
            order
        );
        Ok(sqlx::query_as::<_, Parameter>(&sql)
            .bind(poll_id)
            .bind(&filter.key)
            .bind(&filter.key_contains)
            .bind(&filter.key_starts_with)
            .bind(&filter.key_ends_with)
            .bind(filter.first)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_parameter(&self, poll_id: i32, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM params WHERE poll_id = $1 AND key = $2")
            .bind(poll_id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_parameters(&self, poll_id: i32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM params WHERE poll_id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/*
 * These run against a live database and are skipped unless DATABASE_URL is
 * set. Poll names carry a random suffix so runs don't trip over each other
 */
