//! 数据库基础设施
//!
//! PostgreSQL 连接池与基于 sqlx 的订单存储。每个会话独占一条池连接，
//! 连接在会话 drop 时归还连接池。

use async_trait::async_trait;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgConnection, PgPool, PgPoolOptions},
    Postgres,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use super::config::DatabaseConfig;
use crate::app::order::{
    model::{NewOrder, Order},
    store::{OrderRepository, OrderStore, StoreError, StoreResult, WriteMode},
};

const ORDER_COLUMNS: &str = "id, customer_name, product, quantity, order_date, status, version";

pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        info!("Connecting to database: {}", mask_password(&config.url));

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    // 创建数据库表（在实际部署中应该使用迁移）
    pub async fn create_tables(&self) -> Result<(), sqlx::Error> {
        info!("Creating database tables...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id SERIAL PRIMARY KEY,
                customer_name TEXT NOT NULL,
                product TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                order_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                status TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status)")
            .execute(&self.pool)
            .await?;

        info!("Database tables created successfully");
        Ok(())
    }

    pub fn order_store(&self) -> PgOrderStore {
        PgOrderStore {
            pool: self.pool.clone(),
        }
    }
}

fn mask_password(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let credentials = &url[scheme + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:***{}",
                    &url[..scheme + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// 基于连接池的订单存储
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> StoreResult<PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await?)
    }
}

#[async_trait]
impl OrderRepository for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let mut conn = self.connection().await?;
        queries::insert(&mut conn, order).await
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>> {
        let mut conn = self.connection().await?;
        queries::get_by_id(&mut conn, id).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        let mut conn = self.connection().await?;
        queries::get_all(&mut conn).await
    }

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>> {
        let mut conn = self.connection().await?;
        queries::get_by_status(&mut conn, status).await
    }

    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        let mut conn = self.connection().await?;
        queries::update(&mut conn, order, mode).await
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        queries::delete(&mut conn, id).await
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn session(&self) -> StoreResult<Box<dyn OrderRepository>> {
        let conn = self.connection().await?;
        Ok(Box::new(PgSession {
            conn: Mutex::new(conn),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// 独占一条池连接的会话
struct PgSession {
    conn: Mutex<PoolConnection<Postgres>>,
}

#[async_trait]
impl OrderRepository for PgSession {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let mut conn = self.conn.lock().await;
        queries::insert(&mut conn, order).await
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>> {
        let mut conn = self.conn.lock().await;
        queries::get_by_id(&mut conn, id).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        let mut conn = self.conn.lock().await;
        queries::get_all(&mut conn).await
    }

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>> {
        let mut conn = self.conn.lock().await;
        queries::get_by_status(&mut conn, status).await
    }

    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        let mut conn = self.conn.lock().await;
        queries::update(&mut conn, order, mode).await
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        queries::delete(&mut conn, id).await
    }
}

mod queries {
    use super::*;

    pub async fn insert(conn: &mut PgConnection, order: NewOrder) -> StoreResult<Order> {
        let sql = format!(
            "INSERT INTO orders (customer_name, product, quantity, order_date, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            ORDER_COLUMNS
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(&order.customer_name)
            .bind(&order.product)
            .bind(order.quantity)
            .bind(order.order_date)
            .bind(&order.status)
            .fetch_one(conn)
            .await?;
        Ok(order)
    }

    pub async fn get_by_id(conn: &mut PgConnection, id: i32) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    pub async fn get_all(conn: &mut PgConnection) -> StoreResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY id", ORDER_COLUMNS);
        let orders = sqlx::query_as::<_, Order>(&sql).fetch_all(conn).await?;
        Ok(orders)
    }

    pub async fn get_by_status(conn: &mut PgConnection, status: &str) -> StoreResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE status = $1 ORDER BY id",
            ORDER_COLUMNS
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(status)
            .fetch_all(conn)
            .await?;
        Ok(orders)
    }

    pub async fn update(
        conn: &mut PgConnection,
        order: &Order,
        mode: WriteMode,
    ) -> StoreResult<Order> {
        let guard = match mode {
            WriteMode::LastWriterWins => "",
            WriteMode::Optimistic => " AND version = $7",
        };
        let sql = format!(
            "UPDATE orders SET customer_name = $1, product = $2, quantity = $3, \
             order_date = $4, status = $5, version = version + 1 \
             WHERE id = $6{} RETURNING {}",
            guard, ORDER_COLUMNS
        );

        let mut query = sqlx::query_as::<_, Order>(&sql)
            .bind(&order.customer_name)
            .bind(&order.product)
            .bind(order.quantity)
            .bind(order.order_date)
            .bind(&order.status)
            .bind(order.id);
        if mode == WriteMode::Optimistic {
            query = query.bind(order.version);
        }

        if let Some(saved) = query.fetch_optional(&mut *conn).await? {
            return Ok(saved);
        }

        // 没有行被更新：区分记录不存在与版本冲突
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order.id)
            .fetch_one(&mut *conn)
            .await?;
        if exists.0 && mode == WriteMode::Optimistic {
            Err(StoreError::Conflict(order.id))
        } else {
            Err(StoreError::NotFound(order.id))
        }
    }

    pub async fn delete(conn: &mut PgConnection, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
