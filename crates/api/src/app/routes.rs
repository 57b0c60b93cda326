use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use mailspool_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn send_email(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SendEmailRequest>,
) -> axum::response::Response {
    match services
        .mail()
        .enqueue(&body.to, &body.subject, &body.body)
        .await
    {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(dto::EnqueueResponse { job_id }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JobId = match id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_job_id",
                format!("invalid job id: {e}"),
            );
        }
    };

    match services.mail().get_job(id).await {
        Ok(job) => (StatusCode::OK, Json(dto::JobResponse::from(job))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
