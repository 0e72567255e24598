use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Poll {
    pub id: i32,
    pub name: String,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

/**
 * One selectable option of a poll, answers are always handed out in the
 * order they were created in
 */
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Answer {
    pub id: i32,
    pub poll_id: i32,
    pub name: String,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub answer_id: i32,
    /**
     * Name of the answer this vote was cast for
     */
    pub answer: String,
    pub value: i32,
    /**
     * Votes without an expiry never get swept
     */
    pub valid_until: Option<DateTime<Utc>>,
    pub is_invalid: bool,
    /**
     * Opaque voter identifier, only ever used for counting distinct voters
     */
    pub voter: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Parameter {
    pub poll_id: i32,
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct InsertablePoll {
    pub name: String,
    pub question: String,
    pub answers: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct InsertableVote {
    pub answer_id: i32,
    pub value: i32,
    pub valid_until: Option<DateTime<Utc>>,
    pub voter: Option<String>,
}

/**
 * Direction of a vote
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn matches(self, value: i32) -> bool {
        match self {
            Sign::Positive => value > 0,
            Sign::Negative => value < 0,
        }
    }
}

/**
 * Which votes an invalidation pass should flip
 *
 * Only votes which are still valid are ever matched, which is what makes
 * repeated or overlapping passes harmless
 */
#[derive(Clone, Debug)]
pub enum Invalidate {
    /// Votes whose `valid_until` lies before the given instant
    ExpiredBefore(DateTime<Utc>),
    /// Every vote cast for one of these answers
    Answers(Vec<i32>),
}

/**
 * Filter for looking up the votes of a single poll
 */
#[derive(Clone, Debug, Default)]
pub struct VoteFilter {
    pub voter: Option<String>,
    /// Skip anonymous votes
    pub has_voter: bool,
    pub created_after: Option<DateTime<Utc>>,
    /// Votes still valid at this instant, or never expiring
    pub valid_on: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl VoteFilter {
    pub fn matches(&self, vote: &Vote) -> bool {
        if let Some(voter) = &self.voter {
            if vote.voter.as_ref() != Some(voter) {
                return false;
            }
        }
        if self.has_voter && vote.voter.is_none() {
            return false;
        }
        if let Some(after) = self.created_after {
            if vote.created_at <= after {
                return false;
            }
        }
        if let (Some(on), Some(until)) = (self.valid_on, vote.valid_until) {
            if until < on {
                return false;
            }
        }
        true
    }
}

/**
 * Restricts polls to those carrying a parameter
 */
#[derive(Clone, Debug, Default)]
pub struct PollFilter {
    pub key: Option<String>,
    /// Only considered together with `key`
    pub value: Option<String>,
}

impl PollFilter {
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_none()
    }

    pub fn matches(&self, param: &Parameter) -> bool {
        match (&self.key, &self.value) {
            (Some(key), Some(value)) => &param.key == key && &param.value == value,
            (Some(key), None) => &param.key == key,
            /*
             * A value without a key matches any parameter at all
             */
            (None, _) => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterOrder {
    KeyAsc,
    KeyDesc,
    ValueAsc,
    ValueDesc,
}

impl std::str::FromStr for ParameterOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key_ASC" => Ok(ParameterOrder::KeyAsc),
            "key_DESC" => Ok(ParameterOrder::KeyDesc),
            "value_ASC" => Ok(ParameterOrder::ValueAsc),
            "value_DESC" => Ok(ParameterOrder::ValueDesc),
            other => Err(format!("Unknown orderBy {}", other)),
        }
    }
}

impl ParameterOrder {
    pub fn sql(self) -> &'static str {
        match self {
            ParameterOrder::KeyAsc => "key ASC",
            ParameterOrder::KeyDesc => "key DESC",
            ParameterOrder::ValueAsc => "value ASC",
            ParameterOrder::ValueDesc => "value DESC",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParameterFilter {
    pub key: Option<String>,
    pub key_contains: Option<String>,
    pub key_starts_with: Option<String>,
    pub key_ends_with: Option<String>,
    pub order_by: Option<ParameterOrder>,
    pub first: Option<i64>,
}

impl ParameterFilter {
    pub fn matches(&self, param: &Parameter) -> bool {
        let key = param.key.as_str();
        self.key.as_deref().map_or(true, |k| key == k)
            && self.key_contains.as_deref().map_or(true, |k| key.contains(k))
            && self.key_starts_with.as_deref().map_or(true, |k| key.starts_with(k))
            && self.key_ends_with.as_deref().map_or(true, |k| key.ends_with(k))
    }
}
