//! 任务规划器
//!
//! 有序的（短语集 → 计划模板）规则表，对小写化指令做子串匹配，首个命中的规则生效。
//! 刻意保持为可审查的规则表而非学习型分类器；未命中返回 None，指令走网关路径。

use serde_json::json;

use crate::plan::types::{PlanKind, TaskPlan, TaskStep};

struct PlanRule {
    phrases: &'static [&'static str],
    build: fn(&str) -> TaskPlan,
}

fn inventory_overview(command: &str) -> TaskPlan {
    TaskPlan::new(
        PlanKind::Parallel,
        "Inventory overview: stock levels, low stock alerts and pending orders",
        vec![
            TaskStep::new("get_inventory_status", "Check stock levels").save_as("inventory"),
            TaskStep::new("get_low_stock_items", "Find items needing reorder").save_as("low_stock"),
            TaskStep::new("get_purchase_orders", "List pending purchase orders")
                .with_parameters(json!({"status": "pending"}))
                .save_as("pending_orders"),
        ],
        command,
    )
}

fn conditional_reorder(command: &str) -> TaskPlan {
    TaskPlan::new(
        PlanKind::Conditional,
        "Reorder only when something is actually low",
        vec![
            TaskStep::new("get_low_stock_items", "Find items needing reorder")
                .condition("has_items")
                .save_as("low_stock"),
            TaskStep::new("suggest_reorder_quantities", "Work out reorder quantities")
                .depends_on("low_stock")
                .save_as("suggestions"),
        ],
        command,
    )
}

fn reorder_low_stock(command: &str) -> TaskPlan {
    TaskPlan::new(
        PlanKind::Sequential,
        "Reorder low stock: find shortages, then size the orders",
        vec![
            TaskStep::new("get_low_stock_items", "Find items needing reorder").save_as("low_stock"),
            TaskStep::new("suggest_reorder_quantities", "Work out reorder quantities")
                .depends_on("low_stock")
                .save_as("suggestions"),
        ],
        command,
    )
}

fn sales_driven_reorder(command: &str) -> TaskPlan {
    TaskPlan::new(
        PlanKind::Sequential,
        "Reorder sized from recent sales trends",
        vec![
            TaskStep::new("get_sales_trends", "Analyze recent sales")
                .with_parameters(json!({"days": 30}))
                .save_as("trends"),
            TaskStep::new("suggest_reorder_quantities", "Work out reorder quantities")
                .depends_on("trends")
                .save_as("suggestions"),
        ],
        command,
    )
}

const RULES: &[PlanRule] = &[
    PlanRule {
        phrases: &[
            "full report",
            "inventory report",
            "daily report",
            "morning briefing",
            "complete overview",
        ],
        build: inventory_overview,
    },
    PlanRule {
        phrases: &["reorder if needed", "check and reorder", "reorder anything low"],
        build: conditional_reorder,
    },
    PlanRule {
        phrases: &["reorder low stock", "restock everything", "order what we need"],
        build: reorder_low_stock,
    },
    PlanRule {
        phrases: &["reorder based on sales", "sales based reorder", "reorder from sales"],
        build: sales_driven_reorder,
    },
];

/// 规则表匹配：命中返回按模板实例化的计划，未命中返回 None
#[derive(Default)]
pub struct TaskPlanner;

impl TaskPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn match_command(&self, command: &str) -> Option<TaskPlan> {
        let lowered = command.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.phrases.iter().any(|p| lowered.contains(p)))
            .map(|rule| (rule.build)(command))
    }
}
