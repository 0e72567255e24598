use log::*;
use tide::{Body, Request, Response, StatusCode};
use uuid::Uuid;

use crate::api_models::*;
use crate::error::Error;
use crate::models::VoteFilter;
use crate::routes::{path_param, poll_view, query, requested_poll};
use crate::{votes, AppState};

/**
 *  GET /v2/polls/:name/vote
 */
pub async fn list(req: Request<AppState>) -> tide::Result {
    let q: VoteQuery = query(&req)?;
    let filter = VoteFilter {
        limit: q.limit()?,
        voter: q.uuid,
        has_voter: false,
        created_after: q.created_after,
        valid_on: q.valid_on,
    };
    let name = path_param(&req, "name")?;

    let found = votes::list_votes(req.state().store.as_ref(), &name, &filter).await?;
    let response = VoteList {
        answers: found.into_iter().map(VoteEntry::from).collect(),
    };
    Ok(Body::from_json(&response)?.into())
}

/**
 *  POST /v2/polls/:name/vote
 */
pub async fn cast(mut req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let ballot: Ballot = req
        .body_json()
        .await
        .map_err(|e| Error::Validation(format!("Malformed ballot: {}", e)))?;
    info!("Ballot received for {}: {:?}", poll.name, ballot);

    let cast = ballot.into_votes()?;
    votes::cast_votes(req.state().store.as_ref(), &poll, cast).await?;

    let view = poll_view(req.state(), poll, false).await?;
    Ok(Response::builder(StatusCode::Created)
        .body(Body::from_json(&view)?)
        .build())
}

/**
 *  DELETE /v2/polls/:name/vote/:vote
 */
pub async fn delete(req: Request<AppState>) -> tide::Result {
    let name = path_param(&req, "name")?;
    let raw = path_param(&req, "vote")?;
    /*
     * An id which can't be parsed can't exist either
     */
    let id = Uuid::parse_str(&raw).map_err(|_| Error::not_found("vote", &raw))?;

    votes::delete_vote(req.state().store.as_ref(), &name, id).await?;
    Ok(Response::new(StatusCode::NoContent))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tide::http::Method;
    use tide::StatusCode;

    use crate::routes::tests::*;

    fn counters(body: &Value) -> Vec<i64> {
        body["details"]["answers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["counter"].as_i64().unwrap())
            .collect()
    }

    #[async_std::test]
    async fn test_cast_tallies() {
        let app = app();
        create_color_poll(&app).await;

        let (status, body) = call(
            &app,
            Method::Post,
            "/v2/polls/color/vote",
            Some(json!({"answers": [
                {"answer": "red", "counter": 1},
                {"answer": "red", "counter": 1},
                {"answer": "red", "counter": 1},
                {"answer": "red", "counter": -1}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::Created);
        assert_eq!(counters(&body), vec![2, 0]);
    }

    #[async_std::test]
    async fn test_bad_counter_writes_nothing() {
        let app = app();
        create_color_poll(&app).await;

        let (status, body) = call(
            &app,
            Method::Post,
            "/v2/polls/color/vote",
            Some(json!({"answers": [
                {"answer": "red", "counter": 1},
                {"answer": "blue", "counter": 3}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::BadRequest);
        assert_eq!(body["message"], "counter 3 for answer blue can be either 1 or -1");

        let (_, body) = call(&app, Method::Get, "/v2/polls/color", None).await;
        assert_eq!(counters(&body), vec![0, 0]);
    }

    #[async_std::test]
    async fn test_unknown_answer() {
        let app = app();
        create_color_poll(&app).await;

        let (status, body) = call(
            &app,
            Method::Post,
            "/v2/polls/color/vote",
            Some(json!({"answers": [{"answer": "green", "counter": 1}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BadRequest);
        assert_eq!(body["message"], "answer green does not exist in poll color");
    }

    #[async_std::test]
    async fn test_malformed_ballot() {
        let app = app();
        create_color_poll(&app).await;

        let (status, _) = call(
            &app,
            Method::Post,
            "/v2/polls/color/vote",
            Some(json!({"answers": "red"})),
        )
        .await;
        assert_eq!(status, StatusCode::BadRequest);
    }

    #[async_std::test]
    async fn test_list_and_delete_votes() {
        let app = app();
        create_color_poll(&app).await;
        call(
            &app,
            Method::Post,
            "/v2/polls/color/vote",
            Some(json!({"answers": [
                {"answer": "red", "counter": 1, "UUID": "alice"},
                {"answer": "blue", "counter": -1, "UUID": "bob"}
            ]})),
        )
        .await;

        let (status, body) = call(&app, Method::Get, "/v2/polls/color/vote?UUID=alice", None).await;
        assert_eq!(status, StatusCode::Ok);
        let answers = body["answers"].as_array().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0]["answer"], "red");
        assert_eq!(answers[0]["counter"], 1);
        assert_eq!(answers[0]["UUID"], "alice");
        assert!(answers[0]["validTill"].is_null());

        let id = answers[0]["id"].as_str().unwrap().to_string();
        let path = format!("/v2/polls/color/vote/{}", id);
        let (status, _) = call(&app, Method::Delete, &path, None).await;
        assert_eq!(status, StatusCode::NoContent);
        let (status, _) = call(&app, Method::Delete, &path, None).await;
        assert_eq!(status, StatusCode::NotFound);

        let (_, body) = call(&app, Method::Get, "/v2/polls/color", None).await;
        assert_eq!(counters(&body), vec![0, -1]);
    }

    #[async_std::test]
    async fn test_list_rejects_bad_last() {
        let app = app();
        create_color_poll(&app).await;

        let (status, body) = call(&app, Method::Get, "/v2/polls/color/vote?last=many", None).await;
        assert_eq!(status, StatusCode::BadRequest);
        assert_eq!(body["message"], "Parameter last must be an integer");

        let (status, body) = call(&app, Method::Get, "/v2/polls/color/vote?last=1", None).await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body, json!({"answers": []}));
    }

    #[async_std::test]
    async fn test_delete_garbage_id() {
        let app = app();
        create_color_poll(&app).await;
        let (status, _) = call(&app, Method::Delete, "/v2/polls/color/vote/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NotFound);
    }
}
