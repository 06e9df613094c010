//! 内存订单存储
//!
//! 所有会话共享同一份状态，每个操作在一次写锁或读锁内完成。

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::app::order::{
    model::{NewOrder, Order},
    store::{OrderRepository, OrderStore, StoreError, StoreResult, WriteMode},
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    orders: BTreeMap<i32, Order>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let order = order.into_order(state.next_id);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        Ok(self.state.read().await.orders.values().cloned().collect())
    }

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }

    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        let mut state = self.state.write().await;
        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::NotFound(order.id))?;

        if mode == WriteMode::Optimistic && stored.version != order.version {
            return Err(StoreError::Conflict(order.id));
        }

        let version = stored.version + 1;
        *stored = Order {
            version,
            ..order.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        self.state
            .write()
            .await
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn session(&self) -> StoreResult<Box<dyn OrderRepository>> {
        Ok(Box::new(self.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
