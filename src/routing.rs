//! Application router configuration wiring the API routes to their handlers.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    AppState, ErrorBody,
    category::{create_category_endpoint, get_categories_endpoint, get_category_endpoint},
    endpoints,
    logging::logging_middleware,
    person::{
        create_person_endpoint, delete_person_endpoint, get_people_endpoint, get_person_endpoint,
    },
    report::{totals_by_category_endpoint, totals_by_person_endpoint},
    transaction::{
        create_transaction_endpoint, get_transaction_endpoint, get_transactions_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::PEOPLE,
            get(get_people_endpoint).post(create_person_endpoint),
        )
        .route(
            endpoints::PERSON,
            get(get_person_endpoint).delete(delete_person_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(endpoints::CATEGORY, get(get_category_endpoint))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(endpoints::TOTALS_BY_PERSON, get(totals_by_person_endpoint))
        .route(
            endpoints::TOTALS_BY_CATEGORY,
            get(totals_by_category_endpoint),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// A fallback handler returning a JSON 404 for unknown routes.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            message: "the requested resource could not be found".to_owned(),
        }),
    )
        .into_response()
}
