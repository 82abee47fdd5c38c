use async_trait::async_trait;
use chrono::Utc;
use domain::{Money, NewOrder, Order, OrderStatus, ProductRecord};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderId, ProductId, Result, StoreError, UserId,
    store::{InventoryStore, OrderPage, OrderQuery, OrderStore},
};

const ORDER_COLUMNS: &str = "id, user_id, username, product_id, product_count, amount, status, \
                             payment_id, failure_reason, created_at, updated_at";

fn to_i64(column: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange { column, value })
}

fn to_u64(column: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::CorruptRow(format!("negative {column}: {value}")))
}

/// Runs the bundled schema migrations against `pool`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<OrderStatus>().map_err(StoreError::CorruptRow)?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::new(to_u64("user_id", row.try_get("user_id")?)?),
            username: row.try_get("username")?,
            product_id: ProductId::new(to_u64("product_id", row.try_get("product_id")?)?),
            product_count: to_u64("product_count", row.try_get("product_count")?)?,
            amount: Money::from_units(to_u64("amount", row.try_get("amount")?)?),
            status,
            payment_id: row.try_get("payment_id")?,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(
        skip(self, order),
        fields(user_id = %order.user_id, product_id = %order.product_id)
    )]
    async fn create(&self, order: NewOrder) -> Result<Order> {
        let order = Order::pending(OrderId::new(), order, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, username, product_id, product_count, amount, status,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(to_i64("user_id", order.user_id.get())?)
        .bind(&order.username)
        .bind(to_i64("product_id", order.product_id.get())?)
        .bind(to_i64("product_count", order.product_count)?)
        .bind(to_i64("amount", order.amount.units())?)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        failure_reason: Option<String>,
    ) -> Result<Order> {
        if status.is_terminal() {
            // The guard on the stored status makes the write conditional.
            let row = sqlx::query(&format!(
                r#"
                UPDATE orders
                SET status = $2, failure_reason = COALESCE($3, failure_reason), updated_at = $4
                WHERE id = $1 AND status = 'pending'
                RETURNING {ORDER_COLUMNS}
                "#
            ))
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .bind(&failure_reason)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = row {
                return Self::row_to_order(row);
            }
        }

        // Nothing written: the order is missing, already terminal, or the
        // requested status is not a valid target.
        let current = self
            .get(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if current.status == status && status.is_terminal() {
            return Ok(current);
        }

        Err(StoreError::InvalidTransition {
            order_id,
            from: current.status,
            to: status,
        })
    }

    async fn record_payment(&self, order_id: OrderId, payment_id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE orders SET payment_id = $2, updated_at = $3 WHERE id = $1")
                .bind(order_id.as_uuid())
                .bind(payment_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list(&self, query: OrderQuery) -> Result<OrderPage> {
        let user_id = query
            .user_id
            .map(|id| to_i64("user_id", id.get()))
            .transpose()?;
        let limit = i64::from(query.per_page);
        let offset = to_i64("offset", query.offset())?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::BIGINT IS NULL OR user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderPage {
            orders,
            total: to_u64("total", total)?,
        })
    }
}

/// PostgreSQL-backed product stock.
///
/// Reservations decrement with `UPDATE ... WHERE quantity = <value read>`, so
/// a write that lost a race touches zero rows instead of overselling.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a product row. Used for fixtures and seeding.
    pub async fn upsert_product(&self, product: &ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price, quantity, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, unit_price = EXCLUDED.unit_price,
                quantity = EXCLUDED.quantity, updated_at = now()
            "#,
        )
        .bind(to_i64("id", product.id.get())?)
        .bind(&product.name)
        .bind(to_i64("unit_price", product.unit_price.units())?)
        .bind(to_i64("quantity", product.quantity)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts a product row unless one with the same id exists.
    ///
    /// Returns false when the row was already there; its stock is left alone.
    pub async fn insert_product_if_missing(&self, product: &ProductRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price, quantity, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(to_i64("id", product.id.get())?)
        .bind(&product.name)
        .bind(to_i64("unit_price", product.unit_price.units())?)
        .bind(to_i64("quantity", product.quantity)?)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query("SELECT id, name, unit_price, quantity FROM products WHERE id = $1")
            .bind(to_i64("id", product_id.get())?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(ProductRecord {
                id: ProductId::new(to_u64("id", row.try_get("id")?)?),
                name: row.try_get("name")?,
                unit_price: Money::from_units(to_u64("unit_price", row.try_get("unit_price")?)?),
                quantity: to_u64("quantity", row.try_get("quantity")?)?,
            })
        })
        .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn compare_and_swap_quantity(
        &self,
        product_id: ProductId,
        expected: u64,
        new: u64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET quantity = $3, updated_at = now() WHERE id = $1 AND quantity = $2",
        )
        .bind(to_i64("id", product_id.get())?)
        .bind(to_i64("quantity", expected)?)
        .bind(to_i64("quantity", new)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
