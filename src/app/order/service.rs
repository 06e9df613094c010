//! 订单业务服务

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use super::{
    batch::{BatchProcessor, BatchReport},
    model::{CreateOrderRequest, EditOrderRequest, NewOrder, Order},
    store::{OrderStore, StoreError, WriteMode},
};
use crate::{core::error::CoreError, infrastructure::config::BatchConfig};

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    processor: BatchProcessor,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, batch: &BatchConfig) -> Self {
        let processor = BatchProcessor::new(Arc::clone(&store), batch);
        Self { store, processor }
    }

    pub async fn list(&self) -> Result<Vec<Order>, CoreError> {
        info!("Fetching all orders");
        Ok(self.store.get_all().await?)
    }

    pub async fn get(&self, id: i32) -> Result<Order, CoreError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Order not found: {}", id)))
    }

    /// 新订单总是以 Pending 状态和当前时间入库
    pub async fn create(&self, request: CreateOrderRequest) -> Result<Order, CoreError> {
        if let Err(errors) = request.validate() {
            warn!("Invalid order submitted: {}", errors);
            return Err(errors.into());
        }

        let order = self.store.insert(NewOrder::from(request)).await?;
        info!(order_id = order.id, "Order saved successfully");
        Ok(order)
    }

    /// 手工编辑：整体覆盖并做乐观并发检查
    pub async fn edit(&self, id: i32, request: EditOrderRequest) -> Result<Order, CoreError> {
        if id != request.id {
            return Err(CoreError::NotFound(format!(
                "Order id mismatch: path {} body {}",
                id, request.id
            )));
        }
        request.validate()?;

        let order = Order::from(request);
        match self.store.update(&order, WriteMode::Optimistic).await {
            Ok(saved) => {
                info!(order_id = saved.id, version = saved.version, "Order updated");
                Ok(saved)
            }
            Err(StoreError::Conflict(_)) => {
                // 冲突后记录可能已被删除
                if self.store.get_by_id(id).await?.is_none() {
                    return Err(CoreError::NotFound(format!("Order not found: {}", id)));
                }
                warn!(order_id = id, "Order was modified concurrently");
                Err(CoreError::Conflict(format!(
                    "Order {} was modified by another request",
                    id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: i32) -> Result<(), CoreError> {
        self.store.delete(id).await?;
        info!(order_id = id, "Order deleted");
        Ok(())
    }

    /// 在独立任务上运行批处理，调用方被取消时批处理继续执行
    pub async fn process_pending(&self) -> Result<BatchReport, CoreError> {
        let processor = self.processor.clone();
        let report = tokio::spawn(async move { processor.run().await })
            .await
            .map_err(|e| CoreError::InternalServerError(format!("Batch task failed: {}", e)))??;
        Ok(report)
    }

    pub async fn health(&self) -> Result<(), CoreError> {
        Ok(self.store.ping().await?)
    }
}
