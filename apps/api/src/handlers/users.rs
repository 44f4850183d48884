use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderName, StatusCode};
use ledgerline_core::RequestContext;
use ledgerline_domain::UserId;

use crate::dto::{UserFormRequest, UserResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_users_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state
        .user_service
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(users))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .user_service
        .find_user(UserId::from_i64(user_id))
        .await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<UserFormRequest>,
) -> ApiResult<(StatusCode, [(HeaderName, String); 1], Json<UserResponse>)> {
    let user = state
        .user_service
        .create_user(&context, payload.into())
        .await?;
    let location = format!("/api/users/{}", user.id());

    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(UserResponse::from(user)),
    ))
}

pub async fn edit_user_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UserFormRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .user_service
        .edit_user(&context, UserId::from_i64(user_id), payload.into())
        .await?;

    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state
        .user_service
        .delete_user(&context, UserId::from_i64(user_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
