//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::Order;
use fulfillment::{CreateOrderRequest, OrderOrchestrator};
use serde::{Deserialize, Serialize};
use store::OrderQuery;

use crate::error::ApiError;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: OrderOrchestrator,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub user_id: Option<u64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListOrdersParams {
    fn to_query(&self) -> Result<OrderQuery, ApiError> {
        let page = self.page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(ApiError::BadRequest("page must be at least 1".to_string()));
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::BadRequest(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }

        let query = OrderQuery::new(page, per_page);
        match self.user_id {
            Some(0) => Err(ApiError::BadRequest("user_id must be positive".to_string())),
            Some(id) => Ok(query.for_user(UserId::new(id))),
            None => Ok(query),
        }
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: u64,
    pub username: String,
    pub product_id: u64,
    pub product_count: u64,
    pub amount: u64,
    pub status: String,
    pub payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.get(),
            username: order.username,
            product_id: order.product_id.get(),
            product_count: order.product_count,
            amount: order.amount.units(),
            status: order.status.to_string(),
            payment_id: order.payment_id,
            failure_reason: order.failure_reason,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

// -- Handlers --

/// POST /orders: buy `product_count` units of a product for a user.
///
/// Responds 201 with the terminal order, Failed ones included.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(request) = payload?;
    let order = state.orchestrator.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/{id}: load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {id}")))?;

    Ok(Json(order.into()))
}

/// GET /orders: list orders, optionally for one user.
#[tracing::instrument(skip(state, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let page = state.orchestrator.list_orders(query).await?;

    Ok(Json(OrderListResponse {
        orders: page.orders.into_iter().map(OrderResponse::from).collect(),
        total: page.total,
        page: query.page,
        per_page: query.per_page,
    }))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
