use log::*;
use tide::{Body, Request, Response, StatusCode};

use crate::api_models::*;
use crate::error::Error;
use crate::models::ParameterFilter;
use crate::routes::{path_param, query, requested_poll};
use crate::AppState;

/**
 * GET /v2/polls/:name/params
 */
pub async fn list(req: Request<AppState>) -> tide::Result {
    let q: ParameterQuery = query(&req)?;
    let filter = ParameterFilter {
        first: parse_integer("first", q.first.as_deref())?,
        order_by: q.order_by()?,
        key: q.param_name,
        key_contains: q.contains,
        key_starts_with: q.starts_with,
        key_ends_with: q.ends_with,
    };
    let poll = requested_poll(&req).await?;

    let params = req.state().store.list_parameters(poll.id, &filter).await?;
    let response = ParameterList {
        params: params.into_iter().map(ParameterEntry::from).collect(),
    };
    Ok(Body::from_json(&response)?.into())
}

/**
 * GET /v2/polls/:name/params/:param
 */
pub async fn get(req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let key = path_param(&req, "param")?;

    let param = req
        .state()
        .store
        .find_parameter(poll.id, &key)
        .await?
        .ok_or_else(|| Error::not_found("param", &key))?;
    Ok(Body::from_json(&ParameterEntry::from(param))?.into())
}

/**
 * POST /v2/polls/:name/params
 */
pub async fn upsert(mut req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let body: ParameterUpsertRequest = req
        .body_json()
        .await
        .map_err(|_| Error::Validation("params is malformed".to_string()))?;
    let entries = body.entries()?;

    let mut saved = Vec::with_capacity(entries.len());
    for entry in entries.iter() {
        let param = req
            .state()
            .store
            .upsert_parameter(poll.id, &entry.name, &entry.value)
            .await?;
        saved.push(ParameterEntry::from(param));
    }
    debug!("Saved {} params for poll {}", saved.len(), poll.name);

    Ok(Response::builder(StatusCode::Created)
        .body(Body::from_json(&ParameterList { params: saved })?)
        .build())
}

/**
 * DELETE /v2/polls/:name/params
 */
pub async fn delete_all(req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let count = req.state().store.delete_parameters(poll.id).await?;
    debug!("Deleted {} params from poll {}", count, poll.name);
    Ok(Response::new(StatusCode::NoContent))
}

/**
 * DELETE /v2/polls/:name/params/:param
 */
pub async fn delete(req: Request<AppState>) -> tide::Result {
    let poll = requested_poll(&req).await?;
    let key = path_param(&req, "param")?;

    if !req.state().store.delete_parameter(poll.id, &key).await? {
        return Err(Error::not_found("param", &key).into());
    }
    Ok(Response::new(StatusCode::NoContent))
}
