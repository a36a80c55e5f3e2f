//! HTTP handlers for the stamp catalog.
//! Parse requests into explicit structs and delegate to `StampService`.

use crate::{
    errors::AppError,
    models::stamp::{NewStamp, Stamp, StampPatch},
    services::stamp_service::ImageUpload,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

/// Name of the multipart field carrying the image file.
const IMAGE_FIELD: &str = "image";

/// Query params accepted by `GET /api/stamps`.
#[derive(Debug, Deserialize)]
pub struct ListStampsQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StampResponse {
    pub message: &'static str,
    pub stamp: Stamp,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// GET `/api/stamps` — list stamps, optionally `?category=`.
pub async fn list_stamps(
    State(state): State<AppState>,
    Query(q): Query<ListStampsQuery>,
) -> Result<Json<Vec<Stamp>>, AppError> {
    let stamps = state
        .stamps
        .list(q.category.as_deref())
        .await
        .map_err(|e| e.into_app_error("Failed to fetch stamps"))?;
    Ok(Json(stamps))
}

/// POST `/api/stamps/add` — multipart form with text fields and an optional
/// `image` file.
pub async fn add_stamp(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (fields, image) = read_stamp_form(multipart).await?;

    let stamp = state
        .stamps
        .create(fields, image)
        .await
        .map_err(|e| e.into_app_error("Failed to add stamp"))?;

    Ok((
        StatusCode::CREATED,
        Json(StampResponse {
            message: "Stamp added successfully",
            stamp,
        }),
    ))
}

/// PUT `/api/stamps/{id}` — partial update of text fields. The image is
/// never changed here.
pub async fn update_stamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StampPatch>, JsonRejection>,
) -> Result<Json<StampResponse>, AppError> {
    let Json(patch) = payload.map_err(json_rejection)?;

    let stamp = state
        .stamps
        .update(&id, patch)
        .await
        .map_err(|e| e.into_app_error("Update failed"))?;

    Ok(Json(StampResponse {
        message: "Stamp updated successfully",
        stamp,
    }))
}

/// A body that parses but does not fit [`StampPatch`] is a bad request like
/// any other malformed body.
fn json_rejection(rej: JsonRejection) -> AppError {
    match rej {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            AppError::bad_request(rej.body_text())
        }
        _ => AppError::new(rej.status(), rej.body_text()),
    }
}

/// DELETE `/api/stamps/{id}`.
pub async fn delete_stamp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .stamps
        .delete(&id)
        .await
        .map_err(|e| e.into_app_error("Delete failed"))?;

    Ok(Json(MessageResponse {
        message: "Stamp deleted successfully",
    }))
}

/// Collect the known text fields and the single optional image from a
/// multipart body. Unknown fields are skipped.
async fn read_stamp_form(
    mut multipart: Multipart,
) -> Result<(NewStamp, Option<ImageUpload>), AppError> {
    let mut fields = NewStamp::default();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            if image.is_some() {
                return Err(AppError::bad_request("only one image may be uploaded"));
            }
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::new(e.status(), e.body_text()))?;
            // Browsers send an empty, unnamed part when no file was chosen.
            if !(bytes.is_empty() && file_name.is_empty()) {
                image = Some(ImageUpload { file_name, bytes });
            }
            continue;
        }

        let slot = match name.as_str() {
            "title" => &mut fields.title,
            "year" => &mut fields.year,
            "description" => &mut fields.description,
            "country" => &mut fields.country,
            "value" => &mut fields.value,
            "category" => &mut fields.category,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| AppError::new(e.status(), e.body_text()))?;
        *slot = Some(text);
    }

    Ok((fields, image))
}
