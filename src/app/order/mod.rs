//! 订单管理

pub mod batch;
pub mod handler;
pub mod model;
pub mod service;
pub mod store;

pub use batch::{BatchProcessor, BatchReport, IterationReport, TaskOutcome, REPORT_WINDOW};
pub use model::{NewOrder, Order, STATUS_PENDING, STATUS_PROCESSED};
pub use service::OrderService;
pub use store::{OrderRepository, OrderStore, StoreError, StoreResult, WriteMode};
