//! 订单存储抽象
//!
//! 每个操作只保证单行原子性，不提供跨行事务。批处理的 Pending 查询与
//! 随后的逐单写入之间没有任何锁，因此与其他写入方存在竞争。

use async_trait::async_trait;
use thiserror::Error;

use super::model::{NewOrder, Order};

/// 存储错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(i32),
    #[error("Concurrency conflict on order {0}")]
    Conflict(i32),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 更新时的并发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 无条件覆盖，后写者胜出（批处理路径）
    LastWriterWins,
    /// 仅当存储中的版本号等于 `order.version` 时写入（手工编辑路径）
    Optimistic,
}

/// 订单的增删改查
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 插入订单，返回带有存储分配 id 的记录
    async fn insert(&self, order: NewOrder) -> StoreResult<Order>;

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>>;

    async fn get_all(&self) -> StoreResult<Vec<Order>>;

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>>;

    /// 覆盖订单的所有可变字段，成功后返回新版本的记录
    ///
    /// 记录不存在时返回 `NotFound`；`Optimistic` 模式下版本不一致返回 `Conflict`。
    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order>;

    async fn delete(&self, id: i32) -> StoreResult<()>;
}

/// 可以打开独立会话的存储
///
/// 会话在被 drop 时归还底层连接，无论调用方是成功、失败还是被取消。
#[async_trait]
pub trait OrderStore: OrderRepository {
    async fn session(&self) -> StoreResult<Box<dyn OrderRepository>>;

    /// 存储健康检查
    async fn ping(&self) -> StoreResult<()> {
        self.get_by_id(0).await.map(|_| ())
    }
}
