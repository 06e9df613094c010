//! 订单数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 新建订单的初始状态
pub const STATUS_PENDING: &str = "Pending";
/// 批处理完成后的状态
pub const STATUS_PROCESSED: &str = "Processed";

/// 订单记录
///
/// `status` 是自由字符串，除批处理外没有任何状态迁移约束。
/// `version` 是行版本号，每次成功更新加一，仅供手工编辑路径做乐观并发检查。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i32,
    pub customer_name: String,
    pub product: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub version: i32,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == STATUS_PENDING
    }
}

/// 插入存储前的订单（尚未分配 id）
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub product: String,
    pub quantity: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
}

impl NewOrder {
    /// 以 Pending 状态和当前时间创建订单
    pub fn pending(
        customer_name: impl Into<String>,
        product: impl Into<String>,
        quantity: i32,
    ) -> Self {
        Self {
            customer_name: customer_name.into(),
            product: product.into(),
            quantity,
            order_date: Utc::now(),
            status: STATUS_PENDING.to_string(),
        }
    }

    /// 插入后的完整记录
    pub fn into_order(self, id: i32) -> Order {
        Order {
            id,
            customer_name: self.customer_name,
            product: self.product,
            quantity: self.quantity,
            order_date: self.order_date,
            status: self.status,
            version: 0,
        }
    }
}

// 创建订单请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 100, message = "Customer name must be between 1 and 100 characters"))]
    pub customer_name: String,

    #[validate(length(min = 1, max = 100, message = "Product must be between 1 and 100 characters"))]
    pub product: String,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder::pending(req.customer_name, req.product, req.quantity)
    }
}

// 编辑订单请求，所有字段整体覆盖；只校验客户名与产品
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EditOrderRequest {
    pub id: i32,

    #[validate(length(min = 1, max = 100, message = "Customer name must be between 1 and 100 characters"))]
    pub customer_name: String,

    #[validate(length(min = 1, max = 100, message = "Product must be between 1 and 100 characters"))]
    pub product: String,

    pub quantity: i32,

    pub order_date: DateTime<Utc>,

    /// 任意字符串，编辑路径不限制状态迁移
    pub status: String,

    /// 客户端读取时看到的版本号
    pub version: i32,
}

impl From<EditOrderRequest> for Order {
    fn from(req: EditOrderRequest) -> Self {
        Order {
            id: req.id,
            customer_name: req.customer_name,
            product: req.product,
            quantity: req.quantity,
            order_date: req.order_date,
            status: req.status,
            version: req.version,
        }
    }
}
