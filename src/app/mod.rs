//! 应用层

pub mod order;
