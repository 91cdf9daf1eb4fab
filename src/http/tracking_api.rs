use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::AppError;
use crate::services::tracking_service::TrackingService;

#[derive(Serialize, ToSchema)]
pub struct OrderStatusResponse {
    pub order_number: String,
    pub status: String,
    pub total_amount: Decimal,
    pub processed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub status: String,
    pub changed_by: String,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerStatusResponse {
    pub name: String,
    pub order_types: String,
    pub status: String,
    pub orders_processed: i64,
    pub last_seen: DateTime<Utc>,
}

#[derive(OpenApi)]
#[openapi(
    paths(order_status, order_history, worker_status),
    components(schemas(OrderStatusResponse, HistoryEntryResponse, WorkerStatusResponse)),
    tags((name = "Tracking", description = "Read-only order and worker status API"))
)]
struct ApiDoc;

pub fn router(service: Arc<TrackingService>) -> Router {
    let (api_router, api_spec) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes![order_status])
        .routes(routes![order_history])
        .routes(routes![worker_status])
        .split_for_parts();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_spec))
        .merge(api_router)
        .layer(Extension(service))
}

#[utoipa::path(
    get,
    path = "/orders/{order_number}/status",
    tag = "Tracking",
    params(("order_number" = String, Path, description = "Externally visible order number")),
    responses(
        (status = 200, description = "Current order status", body = OrderStatusResponse),
        (status = 404, description = "Order not found")
    )
)]
async fn order_status(
    Extension(service): Extension<Arc<TrackingService>>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderStatusResponse>, AppError> {
    let order = service.get_status(&order_number).await?;
    Ok(Json(OrderStatusResponse {
        order_number: order.number,
        status: order.status.as_str().to_string(),
        total_amount: order.total_amount,
        processed_by: order.processed_by,
        completed_at: order.completed_at,
    }))
}

#[utoipa::path(
    get,
    path = "/orders/{order_number}/history",
    tag = "Tracking",
    params(("order_number" = String, Path, description = "Externally visible order number")),
    responses(
        (status = 200, description = "Full status-transition history", body = [HistoryEntryResponse]),
        (status = 404, description = "Order not found")
    )
)]
async fn order_history(
    Extension(service): Extension<Arc<TrackingService>>,
    Path(order_number): Path<String>,
) -> Result<Json<Vec<HistoryEntryResponse>>, AppError> {
    let history = service.get_history(&order_number).await?;
    Ok(Json(
        history
            .into_iter()
            .map(|entry| HistoryEntryResponse {
                status: entry.status.as_str().to_string(),
                changed_by: entry.changed_by,
                notes: entry.notes,
                changed_at: entry.changed_at,
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/workers/status",
    tag = "Tracking",
    responses(
        (status = 200, description = "Liveness-adjusted worker roster", body = [WorkerStatusResponse]),
        (status = 404, description = "No workers registered")
    )
)]
async fn worker_status(
    Extension(service): Extension<Arc<TrackingService>>,
) -> Result<Json<Vec<WorkerStatusResponse>>, AppError> {
    let workers = service.list_workers().await?;
    Ok(Json(
        workers
            .into_iter()
            .map(|worker| WorkerStatusResponse {
                name: worker.name,
                order_types: worker.order_types,
                status: worker.status.as_str().to_string(),
                orders_processed: worker.orders_processed,
                last_seen: worker.last_seen,
            })
            .collect(),
    ))
}
