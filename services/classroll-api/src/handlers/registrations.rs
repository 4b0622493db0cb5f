use axum::body::Bytes;
use classroll::prelude::*;

use crate::{
    handlers::{collection, json_body, parse_id},
    models::registration::RegistrationKey,
    AppState,
};

fn key_from_path(student_id: &str, class_id: &str) -> Result<RegistrationKey> {
    Ok(RegistrationKey {
        student_id: parse_id(student_id)?,
        class_id: parse_id(class_id)?,
    })
}

pub async fn list(
    State(state): State<AppState>,
    url: ExternalUrl,
    params: CollectionParams,
) -> Result<ApiResponse> {
    let registrations = state.store.registrations().await;
    collection(
        registrations,
        None,
        &state.schemas.registrations,
        &params,
        &state.collections,
        &url,
    )
    .await
}

pub async fn get(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path((student_id, class_id)): Path<(String, String)>,
) -> Result<ApiResponse> {
    let key = key_from_path(&student_id, &class_id)?;
    let registration = state.store.registration(key).await?;
    Ok(registration.export_representation(url.root()).into())
}

pub async fn create(
    State(state): State<AppState>,
    url: ExternalUrl,
    body: Bytes,
) -> Result<ApiResponse> {
    let key = RegistrationKey::import(&json_body(&body)?, url.root())?;
    let registration = state.store.insert_registration(key).await?;
    info!(
        "Registered student {} in class {}",
        key.student_id, key.class_id
    );
    Ok(ApiResponse::created(&registration.locator(url.root())))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((student_id, class_id)): Path<(String, String)>,
) -> Result<ApiResponse> {
    let key = key_from_path(&student_id, &class_id)?;
    state.store.delete_registration(key).await?;
    Ok(ApiResponse::empty())
}
