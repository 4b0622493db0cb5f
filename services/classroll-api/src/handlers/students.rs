use axum::body::Bytes;
use classroll::prelude::*;

use crate::{
    handlers::{collection, json_body, parse_id},
    models::{import_name, registration::RegistrationKey},
    store::Owner,
    AppState,
};

pub async fn list(
    State(state): State<AppState>,
    url: ExternalUrl,
    params: CollectionParams,
) -> Result<ApiResponse> {
    let students = state.store.students().await;
    collection(students, None, &state.schemas.students, &params, &state.collections, &url).await
}

pub async fn get(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
) -> Result<ApiResponse> {
    let student = state.store.student(parse_id(&id)?).await?;
    Ok(student.export_representation(url.root()).into())
}

pub async fn create(
    State(state): State<AppState>,
    url: ExternalUrl,
    body: Bytes,
) -> Result<ApiResponse> {
    let name = import_name(&json_body(&body)?, "student")?;
    let student = state.store.insert_student(name).await;
    info!("Created student {}", student.id);
    Ok(ApiResponse::created(&student.locator(url.root())))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse> {
    let id = parse_id(&id)?;
    // a missing student is a 404 even when the body is also invalid
    state.store.student(id).await?;
    let name = import_name(&json_body(&body)?, "student")?;
    state.store.rename_student(id, name).await?;
    Ok(ApiResponse::empty())
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse> {
    let id = parse_id(&id)?;
    state.store.delete_student(id).await?;
    info!("Deleted student {}", id);
    Ok(ApiResponse::empty())
}

pub async fn list_registrations(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
    params: CollectionParams,
) -> Result<ApiResponse> {
    let owner = Owner::Student(parse_id(&id)?);
    let registrations = state.store.owned_registrations(owner).await?;
    collection(
        registrations,
        Some(owner),
        &state.schemas.registrations,
        &params,
        &state.collections,
        &url,
    )
    .await
}

/// Register this student in the class named by the body's `class_url`
pub async fn create_registration(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse> {
    let student = state.store.student(parse_id(&id)?).await?;
    let mut data = json_body(&body)?;
    if let Some(fields) = data.as_object_mut() {
        fields.insert(
            "student_url".to_string(),
            student.locator(url.root()).into(),
        );
    }

    let key = RegistrationKey::import(&data, url.root())?;
    let registration = state.store.insert_registration(key).await?;
    Ok(ApiResponse::created(&registration.locator(url.root())))
}
