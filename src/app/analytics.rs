use crate::domain::model::{OrderRecord, OrderStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// 後台統計，由已抓取的訂單在本地彙總
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderAnalytics {
    pub total_orders: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_service: BTreeMap<String, usize>,
    /// 未取消訂單的金額總和
    pub revenue: u64,
    pub average_order_value: u64,
}

pub fn summarize(orders: &[OrderRecord]) -> OrderAnalytics {
    let mut analytics = OrderAnalytics {
        total_orders: orders.len(),
        ..Default::default()
    };

    let mut billable = 0u64;
    for order in orders {
        *analytics
            .by_status
            .entry(order.status.as_str().to_string())
            .or_default() += 1;
        *analytics
            .by_service
            .entry(order.service_type.clone())
            .or_default() += 1;

        if order.status != OrderStatus::Cancelled {
            analytics.revenue += order.price;
            billable += 1;
        }
    }

    if billable > 0 {
        analytics.average_order_value = (analytics.revenue + billable / 2) / billable;
    }
    analytics
}
