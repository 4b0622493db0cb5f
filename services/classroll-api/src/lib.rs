//! Students, classes and registrations over in-memory tables
//!
//! Every `/v1` route goes through the classroll pipeline: rate limited per
//! operation and caller, with conditional caching on reads. Callers identify
//! themselves with the `X-Client-Id` header; requests without one share the
//! anonymous quota.

pub mod handlers;
pub mod models;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::get,
};
use classroll::{conditional::conditional_cache, prelude::*};

use crate::{
    handlers::{catalog, classes, registrations, students},
    models::{Class, Registration, Student},
    store::Store,
};

/// Header naming the calling client for rate limiting
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Field registries of the three resources
#[derive(Debug, Clone)]
pub struct Schemas {
    pub students: Arc<Schema<Student>>,
    pub classes: Arc<Schema<Class>>,
    pub registrations: Arc<Schema<Registration>>,
}

impl Default for Schemas {
    fn default() -> Self {
        Self {
            students: Arc::new(Student::schema()),
            classes: Arc::new(Class::schema()),
            registrations: Arc::new(Registration::schema()),
        }
    }
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub schemas: Schemas,
    pub collections: CollectionOptions,
}

impl AppState {
    /// Empty tables, collections paged at most `max_per_page` items at a time
    pub fn new(max_per_page: u32) -> Self {
        Self {
            store: Arc::new(Store::new()),
            schemas: Schemas::default(),
            collections: CollectionOptions::new(max_per_page),
        }
    }
}

/// Install the [`Caller`] named by the `X-Client-Id` header
pub async fn identify_caller(mut request: Request, next: Next) -> Response {
    let caller = request
        .headers()
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| Caller(value.to_string()));

    if let Some(caller) = caller {
        request.extensions_mut().insert(caller);
    }
    next.run(request).await
}

/// Build the service router
pub fn router(state: AppState, pipeline: &Pipeline) -> Result<Router> {
    let app = Router::new()
        .route(
            "/",
            get(catalog::index).route_layer(from_fn(conditional_cache)),
        )
        .route(
            "/v1/students/",
            pipeline
                .read("get_students", Method::GET, students::list)?
                .merge(pipeline.write("new_student", Method::POST, students::create)?),
        )
        .route(
            "/v1/students/{id}",
            pipeline
                .read("get_student", Method::GET, students::get)?
                .merge(pipeline.write("edit_student", Method::PUT, students::edit)?)
                .merge(pipeline.write("delete_student", Method::DELETE, students::delete)?),
        )
        .route(
            "/v1/students/{id}/registrations/",
            pipeline
                .read(
                    "get_student_registrations",
                    Method::GET,
                    students::list_registrations,
                )?
                .merge(pipeline.write(
                    "new_student_registration",
                    Method::POST,
                    students::create_registration,
                )?),
        )
        .route(
            "/v1/classes/",
            pipeline
                .read("get_classes", Method::GET, classes::list)?
                .merge(pipeline.write("new_class", Method::POST, classes::create)?),
        )
        .route(
            "/v1/classes/{id}",
            pipeline
                .read("get_class", Method::GET, classes::get)?
                .merge(pipeline.write("edit_class", Method::PUT, classes::edit)?)
                .merge(pipeline.write("delete_class", Method::DELETE, classes::delete)?),
        )
        .route(
            "/v1/classes/{id}/registrations/",
            pipeline
                .read(
                    "get_class_registrations",
                    Method::GET,
                    classes::list_registrations,
                )?
                .merge(pipeline.write(
                    "new_class_registration",
                    Method::POST,
                    classes::create_registration,
                )?),
        )
        .route(
            "/v1/registrations/",
            pipeline
                .read("get_registrations", Method::GET, registrations::list)?
                .merge(pipeline.write("new_registration", Method::POST, registrations::create)?),
        )
        .route(
            "/v1/registrations/{student_id}/{class_id}",
            pipeline
                .read("get_registration", Method::GET, registrations::get)?
                .merge(pipeline.write(
                    "delete_registration",
                    Method::DELETE,
                    registrations::delete,
                )?),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(from_fn(identify_caller))
        .with_state(state);

    Ok(app)
}
