//! 待处理订单批处理器
//!
//! 循环执行：查询全部 Pending 订单，为每个订单启动一个独立任务将其标记为
//! Processed，等待本轮全部任务结束后再开始下一轮，直到某次查询结果为空。
//!
//! 查询与写入之间没有事务或行锁，写入采用后写者胜出，与手工编辑、删除或
//! 另一个并发批处理之间的竞争是可观察的。若新订单的产生速度快于处理速度，
//! 或某个订单的写入持续失败，循环不会结束。

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{debug, error, info};

use super::{
    model::{Order, STATUS_PENDING, STATUS_PROCESSED},
    store::{OrderStore, StoreResult, WriteMode},
};
use crate::infrastructure::config::BatchConfig;

/// 单个订单任务的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Processed { order_id: i32 },
    Failed { order_id: i32, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedOrder {
    pub order_id: i32,
    pub error: String,
}

/// 一轮（查询 + 并发写入 + 等待）的汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub selected: usize,
    pub processed: Vec<i32>,
    pub failed: Vec<FailedOrder>,
}

impl IterationReport {
    fn new(iteration: usize, selected: usize) -> Self {
        Self {
            iteration,
            selected,
            processed: Vec::with_capacity(selected),
            failed: Vec::new(),
        }
    }

    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Processed { order_id } => self.processed.push(order_id),
            TaskOutcome::Failed { order_id, error } => {
                self.failed.push(FailedOrder { order_id, error })
            }
        }
    }
}

/// 报告中保留的最近轮次数
pub const REPORT_WINDOW: usize = 16;

/// 整个批处理的汇总
///
/// 计数覆盖全部轮次，明细只保留最近 `REPORT_WINDOW` 轮，
/// 循环不结束时占用的内存也不会增长。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    iteration_count: usize,
    total_processed: usize,
    total_failed: usize,
    pub iterations: VecDeque<IterationReport>,
}

impl BatchReport {
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn total_processed(&self) -> usize {
        self.total_processed
    }

    pub fn total_failed(&self) -> usize {
        self.total_failed
    }

    pub fn record(&mut self, pass: IterationReport) {
        self.iteration_count += 1;
        self.total_processed += pass.processed.len();
        self.total_failed += pass.failed.len();

        if self.iterations.len() == REPORT_WINDOW {
            self.iterations.pop_front();
        }
        self.iterations.push_back(pass);
    }
}

#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<dyn OrderStore>,
    // None 表示不限制并发
    limiter: Option<Arc<Semaphore>>,
    // 非空轮次的编号，所有克隆共享
    passes: Arc<AtomicUsize>,
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn OrderStore>, config: &BatchConfig) -> Self {
        Self {
            store,
            limiter: config
                .max_concurrency
                .map(|permits| Arc::new(Semaphore::new(permits))),
            passes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 处理所有待处理订单，直到一次查询返回空集
    ///
    /// 单个订单的写入失败只会被记录，不会中止循环；只有 Pending 查询本身
    /// 失败时才返回错误。
    pub async fn run(&self) -> StoreResult<BatchReport> {
        info!("Processing all pending orders");

        let mut report = BatchReport::default();
        while let Some(pass) = self.iterate().await? {
            report.record(pass);
        }

        info!(
            iterations = report.iteration_count(),
            processed = report.total_processed(),
            failed = report.total_failed(),
            "No pending orders remain"
        );
        Ok(report)
    }

    /// 只执行一轮；查询为空时返回 `None`
    ///
    /// 轮次编号在同一个处理器上持续递增，与 `run` 共用。
    pub async fn run_iteration(&self) -> StoreResult<Option<IterationReport>> {
        self.iterate().await
    }

    async fn iterate(&self) -> StoreResult<Option<IterationReport>> {
        let orders = self.store.get_by_status(STATUS_PENDING).await?;
        if orders.is_empty() {
            debug!("Pending query returned no orders");
            return Ok(None);
        }

        let iteration = self.passes.fetch_add(1, Ordering::SeqCst) + 1;

        info!(iteration, count = orders.len(), "Dispatching pending orders");

        let mut report = IterationReport::new(iteration, orders.len());
        let tasks: Vec<(i32, JoinHandle<TaskOutcome>)> = orders
            .into_iter()
            .map(|order| {
                let order_id = order.id;
                let store = Arc::clone(&self.store);
                let limiter = self.limiter.clone();
                (order_id, tokio::spawn(process_order(store, limiter, order)))
            })
            .collect();

        // 屏障：本轮全部任务结束之前不会开始下一次查询
        for (order_id, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(order_id, error = %e, "Order task did not complete");
                    TaskOutcome::Failed {
                        order_id,
                        error: e.to_string(),
                    }
                }
            };
            report.record(outcome);
        }

        debug!(
            iteration,
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Iteration finished"
        );
        Ok(Some(report))
    }
}

async fn process_order(
    store: Arc<dyn OrderStore>,
    limiter: Option<Arc<Semaphore>>,
    mut order: Order,
) -> TaskOutcome {
    // 信号量从不关闭，acquire 不会失败
    let _permit = match limiter {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    };

    let order_id = order.id;
    info!(order_id, "Processing order");

    order.status = STATUS_PROCESSED.to_string();
    match persist(store.as_ref(), &order).await {
        Ok(saved) => {
            info!(order_id, version = saved.version, "Order processed successfully");
            TaskOutcome::Processed { order_id }
        }
        Err(e) => {
            error!(order_id, error = %e, "Error processing order");
            TaskOutcome::Failed {
                order_id,
                error: e.to_string(),
            }
        }
    }
}

// 每个任务使用自己的会话，函数返回时会话随之释放
async fn persist(store: &dyn OrderStore, order: &Order) -> StoreResult<Order> {
    let session = store.session().await?;
    session.update(order, WriteMode::LastWriterWins).await
}
