use axum::{
    Json,
    extract::{Extension, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    middleware::AuthSession,
    routes::user::Role,
    utils::validated,
};

use super::model::{CreateReportRequest, ListReportsQuery, Report, UpdateStatusRequest};

/// 提交报案。reporterId 一律取当前调用方，status 固定从 pending 起步
#[axum::debug_handler]
pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let caller = auth.require()?.clone();
    let req = validated(payload)?;

    let report = Report::create(&state.pool, caller.id, &req).await?;
    tracing::info!("report {} created by {}", report.id, caller.username);

    // 通知邮件不阻塞响应，发送结果只进日志
    if let Some(mailer) = &state.mailer {
        mailer.notify_report_created(report.clone(), caller.username);
    }

    Ok((StatusCode::CREATED, Json(report)))
}

/// 管理员可带过滤看全量，普通报案人只能看自己的
#[axum::debug_handler]
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Query(query): Query<ListReportsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let caller = auth.require()?;

    let reports = match caller.role {
        Role::Admin => {
            Report::list_all(
                &state.pool,
                query.status.as_deref(),
                query.category.as_deref(),
            )
            .await?
        }
        Role::Reporter => Report::list_by_reporter(&state.pool, caller.id).await?,
    };

    Ok(Json(reports))
}

#[axum::debug_handler]
pub async fn get_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let caller = auth.require()?;

    let report = Report::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound("Report"))?;

    if caller.role != Role::Admin && report.reporter_id != caller.id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(report))
}

/// 状态流转仅限管理员；枚举外的取值在入口就被拒绝，不会触库
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.require_admin()?.username.clone();
    let req = validated(payload)?;

    let report = Report::update_status(&state.pool, id, req.status)
        .await?
        .ok_or(AppError::NotFound("Report"))?;

    tracing::info!("report {} set to {} by {}", report.id, report.status, admin);
    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn delete_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthSession>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.require_admin()?.username.clone();

    if !Report::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Report"));
    }

    tracing::info!("report {} deleted by {}", id, admin);
    Ok(StatusCode::OK)
}
