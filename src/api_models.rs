/*!
 * The api_models module contains all the JSON shapes for requests and responses
 *
 * Request bodies are deserialized into loose structs first and then checked,
 * so that clients get a message naming the offending field
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ParameterOrder, Parameter, Vote};
use crate::stats::VoterStats;
use crate::tally::AnswerTally;
use crate::votes::CastVote;

#[derive(Debug, Serialize)]
pub struct PollSummary {
    pub name: String,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct PollList {
    pub polls: Vec<PollSummary>,
}

#[derive(Debug, Serialize)]
pub struct PollDetails {
    pub answers: Vec<AnswerTally>,
}

/**
 * A poll together with its current tally
 */
#[derive(Debug, Serialize)]
pub struct PollView {
    pub question: String,
    pub published_at: DateTime<Utc>,
    pub details: PollDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<VoterStats>,
}

#[derive(Debug, Serialize)]
pub struct StatView {
    pub question: String,
    pub published_at: DateTime<Utc>,
    pub details: VoterStats,
}

/**
 * User-provided details to create a Poll
 */
#[derive(Debug, Deserialize)]
pub struct PollCreateRequest {
    pub name: String,
    pub question: String,
    /**
     * Just the names of each answer
     */
    pub answers: Vec<String>,
}

impl PollCreateRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        if self.answers.is_empty() {
            return Err(Error::Validation("answers must not be empty".to_string()));
        }
        for (idx, answer) in self.answers.iter().enumerate() {
            if self.answers[..idx].contains(answer) {
                return Err(Error::Validation(format!("answer {} is listed twice", answer)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct BallotEntry {
    pub answer: String,
    /**
     * Kept as a float so that 1.5 is reported as a bad counter rather than a
     * malformed body
     */
    pub counter: f64,
    #[serde(rename = "validTill", default)]
    pub valid_till: Option<DateTime<Utc>>,
    #[serde(rename = "UUID", default)]
    pub uuid: Option<String>,
}

/**
 * User-provided ballot with all their votes
 */
#[derive(Debug, Deserialize)]
pub struct Ballot {
    pub answers: Vec<BallotEntry>,
}

impl Ballot {
    pub fn into_votes(self) -> Result<Vec<CastVote>> {
        self.answers
            .into_iter()
            .map(|entry| {
                if entry.counter.fract() != 0.0 || entry.counter.abs() != 1.0 {
                    return Err(Error::Validation(format!(
                        "counter {} for answer {} can be either 1 or -1",
                        entry.counter, entry.answer
                    )));
                }
                Ok(CastVote {
                    answer: entry.answer,
                    value: entry.counter as i32,
                    valid_until: entry.valid_till,
                    voter: entry.uuid.filter(|u| !u.is_empty()),
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetEntry {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub answers: Vec<ResetEntry>,
}

#[derive(Debug, Serialize)]
pub struct VoteEntry {
    pub id: Uuid,
    pub answer: String,
    pub counter: i32,
    #[serde(rename = "validTill")]
    pub valid_till: Option<DateTime<Utc>>,
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
}

impl From<Vote> for VoteEntry {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            answer: vote.answer,
            counter: vote.value,
            valid_till: vote.valid_until,
            uuid: vote.voter,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoteList {
    pub answers: Vec<VoteEntry>,
}

/**
 * Query string of GET /v2/polls/:name/vote
 */
#[derive(Debug, Default, Deserialize)]
pub struct VoteQuery {
    #[serde(rename = "UUID")]
    pub uuid: Option<String>,
    pub last: Option<String>,
    #[serde(rename = "createdAfter")]
    pub created_after: Option<DateTime<Utc>>,
    #[serde(rename = "validOn")]
    pub valid_on: Option<DateTime<Utc>>,
}

impl VoteQuery {
    pub fn limit(&self) -> Result<Option<i64>> {
        parse_integer("last", self.last.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    #[serde(rename = "withStat")]
    pub with_stat: Option<String>,
}

impl PollQuery {
    pub fn with_stat(&self) -> bool {
        self.with_stat.as_deref() == Some("true")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PollListQuery {
    #[serde(rename = "paramName")]
    pub param_name: Option<String>,
    #[serde(rename = "paramValue")]
    pub param_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParameterQuery {
    #[serde(rename = "paramName")]
    pub param_name: Option<String>,
    #[serde(rename = "paramNameContains")]
    pub contains: Option<String>,
    #[serde(rename = "paramNameStartsWith")]
    pub starts_with: Option<String>,
    #[serde(rename = "paramNameEndsWith")]
    pub ends_with: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    pub first: Option<String>,
}

impl ParameterQuery {
    pub fn order_by(&self) -> Result<Option<ParameterOrder>> {
        self.order_by
            .as_deref()
            .map(|raw| raw.parse().map_err(Error::Validation))
            .transpose()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ParameterEntry {
    #[serde(rename = "paramName")]
    pub name: String,
    #[serde(rename = "paramValue")]
    pub value: String,
}

impl From<Parameter> for ParameterEntry {
    fn from(param: Parameter) -> Self {
        Self {
            name: param.key,
            value: param.value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParameterList {
    pub params: Vec<ParameterEntry>,
}

/**
 * Body of POST /v2/polls/:name/params
 *
 * Taken as raw JSON first so that anything other than a list of entries is
 * reported as malformed
 */
#[derive(Debug, Deserialize)]
pub struct ParameterUpsertRequest {
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ParameterUpsertRequest {
    pub fn entries(self) -> Result<Vec<ParameterEntry>> {
        if !self.params.is_array() {
            return Err(Error::Validation("params is malformed".to_string()));
        }
        serde_json::from_value(self.params)
            .map_err(|e| Error::Validation(format!("params is malformed: {}", e)))
    }
}

/**
 * Pagination style arguments arrive as strings so a bad one can be named
 */
pub fn parse_integer(name: &str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 0 => Ok(Some(n)),
            _ => Err(Error::Validation(format!(
                "Parameter {} must be an integer",
                name
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ballot_parses_wire_names() {
        let ballot: Ballot = serde_json::from_str(
            r#"{"answers": [
                {"answer": "red", "counter": 1, "validTill": "2030-01-01T00:00:00Z", "UUID": "abc"},
                {"answer": "blue", "counter": -1}
            ]}"#,
        )
        .unwrap();
        let votes = ballot.into_votes().unwrap();
        assert_eq!(votes.len(), 2);
        assert_eq!(votes[0].value, 1);
        assert_eq!(votes[0].voter.as_deref(), Some("abc"));
        assert!(votes[0].valid_until.is_some());
        assert_eq!(votes[1].value, -1);
        assert!(votes[1].voter.is_none());
    }

    #[test]
    fn test_ballot_rejects_bad_counters() {
        for counter in &["0", "2", "-3", "1.5"] {
            let body = format!(r#"{{"answers": [{{"answer": "red", "counter": {}}}]}}"#, counter);
            let ballot: Ballot = serde_json::from_str(&body).unwrap();
            assert!(matches!(ballot.into_votes(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_poll_create_validation() {
        let request = PollCreateRequest {
            name: "color".into(),
            question: "?".into(),
            answers: vec!["red".into(), "red".into()],
        };
        assert!(request.validate().is_err());

        let request = PollCreateRequest {
            name: "color".into(),
            question: "?".into(),
            answers: vec!["red".into(), "blue".into()],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("last", None).unwrap(), None);
        assert_eq!(parse_integer("last", Some("3")).unwrap(), Some(3));
        let err = parse_integer("last", Some("three")).unwrap_err();
        assert_eq!(err.to_string(), "Parameter last must be an integer");
    }

    #[test]
    fn test_parameter_upsert_malformed() {
        let request: ParameterUpsertRequest =
            serde_json::from_str(r#"{"params": {"paramName": "a"}}"#).unwrap();
        assert!(request.entries().is_err());

        let request: ParameterUpsertRequest =
            serde_json::from_str(r#"{"params": [{"paramName": "a", "paramValue": "1"}]}"#)
                .unwrap();
        assert_eq!(request.entries().unwrap()[0].name, "a");
    }
}
