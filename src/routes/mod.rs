/*!
 * The routes module contains all the tide routes and the logic to fulfill the responses for each
 * route.
 *
 * Modules are nested for cleaner organization here
 */
use log::*;
use tide::Request;

use crate::api_models::{PollDetails, PollView};
use crate::error::{Error, Result};
use crate::models::Poll;
use crate::{stats, tally, votes, AppState};

pub mod params;
pub mod polls;
pub mod vote;

/**
 * Assemble the tide application with every /v2 route
 */
pub fn build(state: AppState) -> tide::Server<AppState> {
    let mut app = tide::with_state(state);
    app.with(driftwood::DevLogger {});
    app.with(tide::utils::After(crate::error::render));

    app.at("/v2/polls").get(polls::list).post(polls::create);
    app.at("/v2/polls/:name").get(polls::get).delete(polls::delete);
    app.at("/v2/polls/:name/stat").get(polls::stat);
    app.at("/v2/polls/:name/reset").post(polls::reset);
    app.at("/v2/polls/:name/vote").get(vote::list).post(vote::cast);
    app.at("/v2/polls/:name/vote/:vote").delete(vote::delete);
    app.at("/v2/polls/:name/params")
        .get(params::list)
        .post(params::upsert)
        .delete(params::delete_all);
    app.at("/v2/polls/:name/params/:param")
        .get(params::get)
        .delete(params::delete);
    app
}

/**
 * Look up the poll based on the `name` parameter in the request
 */
pub(crate) async fn requested_poll(req: &Request<AppState>) -> Result<Poll> {
    let name = path_param(req, "name")?;
    debug!("Fetching poll: {:?}", name);
    req.state()
        .store
        .find_poll(&name)
        .await?
        .ok_or_else(|| Error::not_found("poll", &name))
}

/**
 * Fetch a path segment, decoded the same way the client encoded it
 */
pub(crate) fn path_param(req: &Request<AppState>, key: &str) -> Result<String> {
    let raw = req
        .param::<String>(key)
        .map_err(|_| Error::Validation(format!("No {} specified", key)))?;
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Error::Validation(format!("{} is not valid UTF-8", key)))
}

/**
 * Parse the query string into `T`, a bad query string is the client's fault
 */
pub(crate) fn query<T: serde::de::DeserializeOwned>(req: &Request<AppState>) -> Result<T> {
    serde_qs::from_str(req.url().query().unwrap_or(""))
        .map_err(|e| Error::Validation(format!("Invalid query string: {}", e)))
}

/**
 * Sweep expired votes and render the current tally of the poll
 */
pub(crate) async fn poll_view(state: &AppState, poll: Poll, with_stat: bool) -> Result<PollView> {
    let store = state.store.as_ref();
    votes::refresh(store).await;

    let answers = tally::compute_poll_tally(store, &poll, state.tally_concurrency).await?;
    let stats = if with_stat {
        Some(stats::compute_voter_stats(store, &poll).await?)
    } else {
        None
    };

    Ok(PollView {
        question: poll.question,
        published_at: poll.created_at,
        details: PollDetails { answers },
        stats,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use tide::http::{Method, Request, Response, Url};
    use tide::StatusCode;

    use crate::store::MemoryStore;
    use crate::AppState;

    pub fn app() -> tide::Server<AppState> {
        super::build(AppState {
            store: Arc::new(MemoryStore::new()),
            tally_concurrency: 2,
        })
    }

    pub async fn call(
        app: &tide::Server<AppState>,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = Url::parse(&format!("http://localhost{}", path)).unwrap();
        let mut req = Request::new(method, url);
        if let Some(body) = body {
            req.set_body(tide::Body::from_json(&body).unwrap());
        }

        let mut res: Response = app.respond(req).await.unwrap();
        let text = res.body_string().await.unwrap();
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (res.status(), value)
    }

    pub async fn create_color_poll(app: &tide::Server<AppState>) {
        let (status, _) = call(
            app,
            Method::Post,
            "/v2/polls",
            Some(json!({"name": "color", "question": "Favourite color?", "answers": ["red", "blue"]})),
        )
        .await;
        assert_eq!(status, StatusCode::Created);
    }
}
