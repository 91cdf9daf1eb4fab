use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::AppError;
use crate::http::request_id::RequestId;
use crate::http::validation::{validate_create_order, CreateOrderRequest, OrderItemRequest};
use crate::services::order_service::OrderService;

#[derive(Serialize, ToSchema)]
pub struct OrderInfo {
    pub order_number: String,
    pub status: String,
    pub total_amount: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub customer_name: String,
    pub order_info: OrderInfo,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(OpenApi)]
#[openapi(
    paths(create_order, health),
    components(schemas(
        CreateOrderRequest,
        OrderItemRequest,
        CreateOrderResponse,
        OrderInfo,
        HealthResponse
    )),
    tags((name = "Orders", description = "Order intake API"))
)]
struct ApiDoc;

/// Builds the order-service's Axum router: the swagger/OpenAPI surface, the
/// order-intake endpoint, and a health probe, with `service` injected as
/// shared state the way the teacher threads its producer through
/// `Extension`.
pub fn router(service: Arc<OrderService>) -> Router {
    let (api_router, api_spec) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes![create_order])
        .routes(routes![health])
        .split_for_parts();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_spec))
        .merge(api_router)
        .layer(axum::middleware::from_fn(crate::http::request_id::attach))
        .layer(Extension(service))
}

/// `Json`'s own rejection surfaces malformed bodies as 400 before this
/// handler ever runs, matching the spec's "400 on malformed JSON" clause;
/// everything past that point is semantic validation, surfaced as 422.
#[utoipa::path(
    post,
    path = "/order",
    tag = "Orders",
    request_body(content = CreateOrderRequest, content_type = "application/json"),
    responses(
        (status = 201, description = "Order accepted", body = CreateOrderResponse),
        (status = 400, description = "Malformed JSON body"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal error, including admission-control rejection")
    )
)]
async fn create_order(
    Extension(service): Extension<Arc<OrderService>>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let draft = validate_create_order(payload).map_err(AppError::ValidationFailed)?;
    let customer_name = draft.customer_name.clone();

    let order = service.create_order(draft, Some(request_id.0)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            customer_name,
            order_info: OrderInfo {
                order_number: order.number,
                status: order.status.as_str().to_string(),
                total_amount: order.total_amount,
            },
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Orders",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
