use log::*;
use tide::{Body, Request, Response, StatusCode};

use crate::api_models::*;
use crate::error::Error;
use crate::models::{InsertablePoll, PollFilter};
use crate::routes::{path_param, poll_view, query, requested_poll};
use crate::{stats, votes, AppState};

/**
 *  GET /v2/polls
 */
pub async fn list(req: Request<AppState>) -> tide::Result {
    let q: PollListQuery = query(&req)?;
    let filter = PollFilter {
        key: q.param_name,
        value: q.param_value,
    };

    let polls = req.state().store.list_polls(&filter).await?;
    let response = PollList {
        polls: polls
            .into_iter()
            .map(|poll| PollSummary {
                name: poll.name,
                question: poll.question,
            })
            .collect(),
    };
    Ok(Body::from_json(&response)?.into())
}

/**
 *  POST /v2/polls
 */
pub async fn create(mut req: Request<AppState>) -> tide::Result {
    let poll: PollCreateRequest = req
        .body_json()
        .await
        .map_err(|e| Error::Validation(format!("Malformed poll: {}", e)))?;
    poll.validate()?;
    debug!("Poll received: {:?}", poll);

    let created = req
        .state()
        .store
        .create_poll(InsertablePoll {
            name: poll.name,
            question: poll.question,
            answers: poll.answers,
        })
        .await?;
    info!("Created poll {}", created.name);

    let view = poll_view(req.state(), created, false).await?;
    Ok(Response::builder(StatusCode::Created)
        .body(Body::from_json(&view)?)
        .build())
}

/**
 * GET /v2/polls/:name
 */
pub async fn get(req: Request<AppState>) -> tide::Result {
    let q: PollQuery = query(&req)?;
    let poll = requested_poll(&req).await?;
    let view = poll_view(req.state(), poll, q.with_stat()).await?;
    Ok(Body::from_json(&view)?.into())
}

/**
 * DELETE /v2/polls/:name
 */
pub async fn delete(req: Request<AppState>) -> tide::Result {
    let name = path_param(&req, "name")?;
    if !req.state().store.delete_poll(&name).await? {
        return Err(Error::not_found("poll", &name).into());
    }
    info!("Deleted poll {}", name);
    Ok(Response::new(StatusCode::NoContent))
}

/**
 * GET /v2/polls/:name/stat
 */
pub async fn stat(req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let store = req.state().store.as_ref();
    votes::refresh(store).await;

    let details = stats::compute_voter_stats(store, &poll).await?;
    let view = StatView {
        question: poll.question,
        published_at: poll.created_at,
        details,
    };
    Ok(Body::from_json(&view)?.into())
}

/**
 * POST /v2/polls/:name/reset
 */
pub async fn reset(mut req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let body: ResetRequest = req
        .body_json()
        .await
        .map_err(|e| Error::Validation(format!("Malformed reset: {}", e)))?;

    let names: Vec<String> = body.answers.into_iter().map(|a| a.answer).collect();
    votes::reset_answers(req.state().store.as_ref(), &poll, &names).await?;

    let view = poll_view(req.state(), poll, false).await?;
    Ok(Response::builder(StatusCode::Created)
        .body(Body::from_json(&view)?)
        .build())
}
