//! 测试用存储：包装内存存储，支持注入写入失败、延迟，并记录写入事件

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use order_desk::{
    app::order::{
        NewOrder, Order, OrderRepository, OrderStore, StoreError, StoreResult, WriteMode,
        STATUS_PENDING,
    },
    infrastructure::memory_store::MemoryOrderStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent {
    Started { order_id: i32, generation: usize },
    Finished { order_id: i32, generation: usize },
}

#[derive(Default)]
pub struct Probe {
    fail_always: Mutex<HashSet<i32>>,
    fail_once: Mutex<HashSet<i32>>,
    // 剩余的失败次数
    fail_times: Mutex<HashMap<i32, usize>>,
    write_delay: Mutex<Option<Duration>>,
    // 前 refill_queries 次 Pending 查询之后各插入 refill_per_query 个新订单
    refill_per_query: AtomicUsize,
    refill_queries: AtomicUsize,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    open_sessions: AtomicUsize,
    in_flight_at_query: Mutex<Vec<usize>>,
    generation_of: Mutex<HashMap<i32, usize>>,
    writes: Mutex<HashMap<i32, usize>>,
    events: Mutex<Vec<WriteEvent>>,
}

#[derive(Clone, Default)]
pub struct ProbeStore {
    inner: MemoryOrderStore,
    probe: Arc<Probe>,
}

impl ProbeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryOrderStore {
        &self.inner
    }

    pub async fn seed_pending(&self, count: usize) -> Vec<Order> {
        let mut orders = Vec::with_capacity(count);
        for i in 0..count {
            orders.push(
                self.inner
                    .insert(NewOrder::pending(format!("customer-{}", i), "Widget", 1))
                    .await
                    .unwrap(),
            );
        }
        orders
    }

    pub fn fail_always(&self, order_id: i32) {
        self.probe.fail_always.lock().unwrap().insert(order_id);
    }

    pub fn fail_once(&self, order_id: i32) {
        self.probe.fail_once.lock().unwrap().insert(order_id);
    }

    pub fn fail_times(&self, order_id: i32, times: usize) {
        self.probe.fail_times.lock().unwrap().insert(order_id, times);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.probe.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn refill(&self, per_query: usize, queries: usize) {
        self.probe.refill_per_query.store(per_query, Ordering::SeqCst);
        self.probe.refill_queries.store(queries, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.probe.queries.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.probe.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.probe.open_sessions.load(Ordering::SeqCst)
    }

    pub fn in_flight_at_queries(&self) -> Vec<usize> {
        self.probe.in_flight_at_query.lock().unwrap().clone()
    }

    pub fn writes_for(&self, order_id: i32) -> usize {
        self.probe
            .writes
            .lock()
            .unwrap()
            .get(&order_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_writes(&self) -> usize {
        self.probe.writes.lock().unwrap().values().sum()
    }

    pub fn events(&self) -> Vec<WriteEvent> {
        self.probe.events.lock().unwrap().clone()
    }

    async fn write(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        let probe = &self.probe;
        let order_id = order.id;
        let generation = probe
            .generation_of
            .lock()
            .unwrap()
            .get(&order_id)
            .copied()
            .unwrap_or(0);

        probe.events.lock().unwrap().push(WriteEvent::Started {
            order_id,
            generation,
        });
        let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *probe.writes.lock().unwrap().entry(order_id).or_insert(0) += 1;

        let delay = *probe.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let injected = probe.fail_always.lock().unwrap().contains(&order_id)
            || probe.fail_once.lock().unwrap().remove(&order_id)
            || take_failure(&mut probe.fail_times.lock().unwrap(), order_id);
        let result = if injected {
            Err(StoreError::Unavailable(format!(
                "injected failure for order {}",
                order_id
            )))
        } else {
            self.inner.update(order, mode).await
        };

        probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        probe.events.lock().unwrap().push(WriteEvent::Finished {
            order_id,
            generation,
        });
        result
    }
}

fn take_failure(remaining: &mut HashMap<i32, usize>, order_id: i32) -> bool {
    match remaining.get_mut(&order_id) {
        Some(count) if *count > 0 => {
            *count -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl OrderRepository for ProbeStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        self.inner.insert(order).await
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>> {
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        self.inner.get_all().await
    }

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>> {
        let probe = &self.probe;
        let generation = probe.queries.fetch_add(1, Ordering::SeqCst) + 1;
        probe
            .in_flight_at_query
            .lock()
            .unwrap()
            .push(probe.in_flight.load(Ordering::SeqCst));

        let orders = self.inner.get_by_status(status).await?;
        {
            let mut generation_of = probe.generation_of.lock().unwrap();
            for order in &orders {
                generation_of.insert(order.id, generation);
            }
        }

        if status == STATUS_PENDING && generation <= probe.refill_queries.load(Ordering::SeqCst) {
            for _ in 0..probe.refill_per_query.load(Ordering::SeqCst) {
                self.inner
                    .insert(NewOrder::pending("late customer", "Widget", 1))
                    .await?;
            }
        }
        Ok(orders)
    }

    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        self.write(order, mode).await
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl OrderStore for ProbeStore {
    async fn session(&self) -> StoreResult<Box<dyn OrderRepository>> {
        self.probe.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ProbeSession {
            store: self.clone(),
        }))
    }
}

/// drop 时登记会话已释放
pub struct ProbeSession {
    store: ProbeStore,
}

impl Drop for ProbeSession {
    fn drop(&mut self) {
        self.store.probe.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for ProbeSession {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        self.store.insert(order).await
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Order>> {
        self.store.get_by_id(id).await
    }

    async fn get_all(&self) -> StoreResult<Vec<Order>> {
        self.store.get_all().await
    }

    async fn get_by_status(&self, status: &str) -> StoreResult<Vec<Order>> {
        self.store.get_by_status(status).await
    }

    async fn update(&self, order: &Order, mode: WriteMode) -> StoreResult<Order> {
        self.store.write(order, mode).await
    }

    async fn delete(&self, id: i32) -> StoreResult<()> {
        self.store.delete(id).await
    }
}
