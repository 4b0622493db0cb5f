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
    let classes = state.store.classes().await;
    collection(classes, None, &state.schemas.classes, &params, &state.collections, &url).await
}

pub async fn get(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
) -> Result<ApiResponse> {
    let class = state.store.class(parse_id(&id)?).await?;
    Ok(class.export_representation(url.root()).into())
}

pub async fn create(
    State(state): State<AppState>,
    url: ExternalUrl,
    body: Bytes,
) -> Result<ApiResponse> {
    let name = import_name(&json_body(&body)?, "class")?;
    let class = state.store.insert_class(name).await;
    info!("Created class {}", class.id);
    Ok(ApiResponse::created(&class.locator(url.root())))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse> {
    let id = parse_id(&id)?;
    // a missing class is a 404 even when the body is also invalid
    state.store.class(id).await?;
    let name = import_name(&json_body(&body)?, "class")?;
    state.store.rename_class(id, name).await?;
    Ok(ApiResponse::empty())
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse> {
    let id = parse_id(&id)?;
    state.store.delete_class(id).await?;
    info!("Deleted class {}", id);
    Ok(ApiResponse::empty())
}

pub async fn list_registrations(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
    params: CollectionParams,
) -> Result<ApiResponse> {
    let owner = Owner::Class(parse_id(&id)?);
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

/// Register the student named by the body's `student_url` in this class
pub async fn create_registration(
    State(state): State<AppState>,
    url: ExternalUrl,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<ApiResponse> {
    let class = state.store.class(parse_id(&id)?).await?;
    let mut data = json_body(&body)?;
    if let Some(fields) = data.as_object_mut() {
        fields.insert(
            "class_url".to_string(),
            class.locator(url.root()).into(),
        );
    }

    let key = RegistrationKey::import(&data, url.root())?;
    let registration = state.store.insert_registration(key).await?;
    Ok(ApiResponse::created(&registration.locator(url.root())))
}
