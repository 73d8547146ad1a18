use axum::middleware;
use axum::routing::post;
use axum::Router;

use crate::auth;
use crate::db::Db;

mod director;
mod shop;
mod student;
mod teacher;

pub fn router(db: Db) -> Router {
    let gated = Router::new()
        .nest("/director", director::router())
        .nest("/teacher", teacher::router())
        .nest("/student", student::router())
        .merge(shop::router())
        .route_layer(middleware::from_fn_with_state(
            db.clone(),
            auth::authenticate,
        ));

    Router::new()
        .route("/login", post(auth::login))
        .merge(gated)
        .with_state(db)
}
