/*!
 * Errors which can be produced anywhere in polltally
 *
 * Route handlers return `tide::Result` and propagate these with `?`, the
 * `render` middleware is what turns them into a status code and a JSON body
 */
use log::*;
use serde::Serialize;
use tide::{Body, Response, StatusCode};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Store failure: {0}")]
    Store(#[from] sqlx::Error),
    #[error("Failed to migrate the database: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NotFound,
            Error::Validation(_) => StatusCode::BadRequest,
            Error::Conflict(_) => StatusCode::Conflict,
            Error::Config(_) | Error::Store(_) | Error::Migrate(_) => {
                StatusCode::InternalServerError
            }
        }
    }

    pub fn not_found(what: &str, name: &str) -> Self {
        Error::NotFound(format!("{} {} does not exist", what, name))
    }
}

#[derive(Serialize)]
struct Message {
    message: String,
}

/**
 * After-middleware which renders any error carried by the response
 *
 * Our own errors get their proper status, everything else keeps whatever
 * status tide gave it but still receives a JSON body
 */
pub async fn render(mut res: Response) -> tide::Result<Response> {
    let rendered = if let Some(err) = res.downcast_error::<Error>() {
        let status = err.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", err);
        } else {
            debug!("Rejecting request: {}", err);
        }

        /*
         * Internal details of store failures are not handed to clients
         */
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Some((status, message))
    } else if let Some(err) = res.error() {
        warn!("Unhandled request error: {:?}", err);
        Some((err.status(), err.to_string()))
    } else {
        None
    };

    if let Some((status, message)) = rendered {
        res.set_status(status);
        res.set_body(Body::from_json(&Message { message })?);
    }
    Ok(res)
}
