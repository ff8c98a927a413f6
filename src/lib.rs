pub mod auth;
pub mod catalog;
pub mod config;
pub mod err;
pub mod memory;
pub mod models;
pub mod pg;
pub mod store;
pub mod users;
pub mod validate;

use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde::Serialize;
use tokio::time::Instant;

use crate::auth::MaybeCaller;
use crate::config::Config;
use crate::err::{proceeds, Payload};
use crate::models::UserId;
use crate::store::SharedStore;

/// Shared by every handler through an `Extension` layer.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SharedStore, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/reset", post(users::reset_password))
        .route(
            "/users/:id",
            get(users::fetch_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/tokens", post(auth::login).delete(auth::logout))
        .fallback(err::handler404)
        .method_not_allowed_fallback(err::handler405)
        .layer(Extension(state))
        .layer(middleware::from_fn(log_requests))
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{} {} -> {} in {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Whoami {
    pub user_id: Option<UserId>,
}

/// Tells the caller who the `Token` header says they are, if anyone.
async fn index(MaybeCaller(caller): MaybeCaller) -> Payload<Whoami> {
    proceeds(Whoami {
        user_id: caller.map(|caller| caller.id),
    })
}
