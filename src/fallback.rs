//! 兜底意图分类器
//!
//! 仅在网关回复既无工具调用也无可用文本时运行：与规划器同款的有序短语规则，
//! 但只映射到单次工具调用；采购订单规则额外从指令中提取状态参数。
//! 无命中产出静态帮助文本，永远不是错误。

use serde_json::{json, Map, Value};

/// 分类命中：单个工具名 + 参数
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackMatch {
    pub tool_name: &'static str,
    pub arguments: Map<String, Value>,
}

struct FallbackRule {
    phrases: &'static [&'static str],
    tool_name: &'static str,
}

// 顺序即优先级：low stock 在 inventory 之前，否则 "stock" 会抢先命中
const RULES: &[FallbackRule] = &[
    FallbackRule {
        phrases: &["low stock", "items low", "reorder"],
        tool_name: "get_low_stock_items",
    },
    FallbackRule {
        phrases: &["inventory", "stock", "products", "all items"],
        tool_name: "get_inventory_status",
    },
    FallbackRule {
        phrases: &["supplier", "vendor"],
        tool_name: "get_supplier_list",
    },
    FallbackRule {
        phrases: &["purchase order", "pending order", "orders"],
        tool_name: "get_purchase_orders",
    },
    FallbackRule {
        phrases: &["warehouse", "unstocked", "not stocked"],
        tool_name: "get_warehouse_inventory",
    },
    FallbackRule {
        phrases: &["sales trend", "best seller", "top selling", "sales analysis"],
        tool_name: "get_sales_trends",
    },
    FallbackRule {
        phrases: &["suggest reorder", "reorder suggestion", "how much to order"],
        tool_name: "suggest_reorder_quantities",
    },
];

const PO_STATUSES: &[&str] = &["pending", "approved", "draft"];

#[derive(Default)]
pub struct FallbackClassifier;

impl FallbackClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 首个短语命中的规则生效；未命中返回 None（调用方转静态帮助）
    pub fn classify(&self, command: &str) -> Option<FallbackMatch> {
        let lowered = command.to_lowercase();
        let rule = RULES
            .iter()
            .find(|rule| rule.phrases.iter().any(|p| lowered.contains(p)))?;

        let mut arguments = Map::new();
        if rule.tool_name == "get_purchase_orders" {
            if let Some(status) = PO_STATUSES.iter().find(|s| lowered.contains(**s)) {
                arguments.insert("status".to_string(), json!(status));
            }
        }

        tracing::info!(tool = rule.tool_name, "fallback intent matched");
        Some(FallbackMatch {
            tool_name: rule.tool_name,
            arguments,
        })
    }

    /// 无命中时的静态帮助
    pub fn help_text(&self) -> String {
        "I can help you with inventory and procurement. Try asking me to:\n\
         - check inventory or low stock items\n\
         - list suppliers or purchase orders\n\
         - check warehouse stock\n\
         - analyze sales trends\n\
         - suggest reorder quantities"
            .to_string()
    }
}
