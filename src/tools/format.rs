//! 工具结果格式化
//!
//! 每个标准工具一个格式化器：Summary 模式产出给模型做总结的一行摘要，
//! Display 模式产出面向用户的完整文本。未注册格式化器的工具走 generic 截断 JSON。

use serde_json::Value;

use crate::tools::registry::OutputMode;

const DISPLAY_LIMIT: usize = 10;

fn str_of<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or("")
}

fn u64_of(v: &Value, key: &str) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn f64_of(v: &Value, key: &str) -> f64 {
    v.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn arr_of<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// 未注册格式化器时的兜底渲染：工具名 + 截断 JSON
pub fn generic(name: &str, result: &Value, _mode: OutputMode) -> String {
    let text = result.to_string();
    let truncated: String = text.chars().take(200).collect();
    if truncated.len() < text.len() {
        format!("{name}: {truncated}...")
    } else {
        format!("{name}: {truncated}")
    }
}

pub fn low_stock(result: &Value, mode: OutputMode) -> String {
    let items = arr_of(result, "items");
    let summary = result.get("summary").cloned().unwrap_or_default();
    let low = u64_of(&summary, "low_stock_count");
    let out = u64_of(&summary, "out_of_stock_count");

    if mode == OutputMode::Summary {
        return format!("Low stock check: {low} items low, {out} out of stock");
    }
    if items.is_empty() {
        return "Good news! No low stock items found. All products are well stocked.".to_string();
    }
    let mut lines = vec![format!("Found {low} low stock items ({out} out of stock):\n")];
    for item in items.iter().take(DISPLAY_LIMIT) {
        let stock = item.get("current_stock").and_then(Value::as_i64).unwrap_or(0);
        let status = if stock <= 0 {
            "OUT OF STOCK".to_string()
        } else {
            format!("Stock: {stock}")
        };
        lines.push(format!(
            "- **{}** - {status} (Reorder point: {}, Suggested qty: {})",
            str_of(item, "name"),
            u64_of(item, "reorder_point"),
            u64_of(item, "suggested_reorder_qty"),
        ));
    }
    if items.len() > DISPLAY_LIMIT {
        lines.push(format!("\n... and {} more items", items.len() - DISPLAY_LIMIT));
    }
    lines.join("\n")
}

pub fn inventory_status(result: &Value, mode: OutputMode) -> String {
    let inventory = arr_of(result, "inventory");
    let total = u64_of(result, "total_products");

    if mode == OutputMode::Summary {
        return format!("Inventory check: {total} products found");
    }
    if inventory.is_empty() {
        return "No products found in inventory.".to_string();
    }
    let out_of_stock: Vec<&Value> = inventory
        .iter()
        .filter(|p| str_of(p, "status") == "out_of_stock")
        .collect();
    let low_stock = inventory
        .iter()
        .filter(|p| str_of(p, "status") == "low_stock")
        .count();
    let ok = (total as usize).saturating_sub(out_of_stock.len() + low_stock);

    let mut lines = vec![format!("Inventory Summary ({total} products):\n")];
    lines.push(format!("- OK: {ok}"));
    lines.push(format!("- Low Stock: {low_stock}"));
    lines.push(format!("- Out of Stock: {}\n", out_of_stock.len()));
    if !out_of_stock.is_empty() {
        lines.push("Out of stock items:".to_string());
        for p in out_of_stock.iter().take(5) {
            lines.push(format!("  - {}", str_of(p, "name")));
        }
    }
    lines.join("\n")
}

pub fn supplier_list(result: &Value, mode: OutputMode) -> String {
    let suppliers = arr_of(result, "suppliers");
    let total = u64_of(result, "total_suppliers");

    if mode == OutputMode::Summary {
        return format!("Supplier list: {total} suppliers found");
    }
    if suppliers.is_empty() {
        return "No suppliers found.".to_string();
    }
    let mut lines = vec![format!("Found {total} suppliers:\n")];
    for s in suppliers.iter().take(DISPLAY_LIMIT) {
        let rating = f64_of(s, "quality_rating");
        let rating = if rating > 0.0 {
            format!("Rating: {rating:.1}/5")
        } else {
            "No rating".to_string()
        };
        let phone = str_of(s, "phone");
        let phone = if phone.is_empty() { "No phone" } else { phone };
        lines.push(format!("- **{}** - {phone} | {rating}", str_of(s, "name")));
    }
    if suppliers.len() > DISPLAY_LIMIT {
        lines.push(format!("\n... and {} more suppliers", suppliers.len() - DISPLAY_LIMIT));
    }
    lines.join("\n")
}

pub fn purchase_orders(result: &Value, mode: OutputMode) -> String {
    let orders = arr_of(result, "orders");
    let total = u64_of(result, "total_orders");

    if mode == OutputMode::Summary {
        return format!("Purchase orders: {total} orders found");
    }
    if orders.is_empty() {
        return "No purchase orders found.".to_string();
    }
    let mut lines = vec![format!("Found {total} purchase orders:\n")];
    for po in orders.iter().take(DISPLAY_LIMIT) {
        lines.push(format!(
            "- **{}** - {} | Status: {} | Total: ${:.2}",
            str_of(po, "po_number"),
            str_of(po, "supplier_name"),
            str_of(po, "status"),
            f64_of(po, "total_amount"),
        ));
    }
    if orders.len() > DISPLAY_LIMIT {
        lines.push(format!("\n... and {} more orders", orders.len() - DISPLAY_LIMIT));
    }
    lines.join("\n")
}

pub fn create_purchase_order(result: &Value, _mode: OutputMode) -> String {
    if result.get("success").and_then(Value::as_bool).unwrap_or(false) {
        format!(
            "Created PO {} for {} totaling ${:.2}",
            str_of(result, "po_number"),
            str_of(result, "supplier_name"),
            f64_of(result, "total_amount"),
        )
    } else {
        let error = str_of(result, "error");
        let error = if error.is_empty() { "Unknown error" } else { error };
        format!("Failed to create PO: {error}")
    }
}

pub fn approve_purchase_order(result: &Value, _mode: OutputMode) -> String {
    if result.get("success").and_then(Value::as_bool).unwrap_or(false) {
        format!("Approved PO {}", str_of(result, "po_number"))
    } else {
        let error = str_of(result, "error");
        let error = if error.is_empty() { "Unknown error" } else { error };
        format!("Failed to approve PO: {error}")
    }
}

pub fn cancel_purchase_order(result: &Value, _mode: OutputMode) -> String {
    if result.get("success").and_then(Value::as_bool).unwrap_or(false) {
        format!("Cancelled PO {}", str_of(result, "po_number"))
    } else {
        let error = str_of(result, "error");
        let error = if error.is_empty() { "Unknown error" } else { error };
        format!("Failed to cancel PO: {error}")
    }
}

pub fn warehouse_inventory(result: &Value, mode: OutputMode) -> String {
    let items = arr_of(result, "warehouse_items");
    let total = u64_of(result, "total_items");

    if mode == OutputMode::Summary {
        return format!("Warehouse check: {total} items in warehouse");
    }
    if items.is_empty() {
        return "No items in warehouse inventory.".to_string();
    }
    let mut lines = vec![format!("Warehouse has {total} items:\n")];
    for item in items.iter().take(DISPLAY_LIMIT) {
        let location = str_of(item, "location");
        let location = if location.is_empty() { "N/A" } else { location };
        lines.push(format!(
            "- **{}** - Qty: {} | Location: {location}",
            str_of(item, "product_name"),
            u64_of(item, "quantity"),
        ));
    }
    if items.len() > DISPLAY_LIMIT {
        lines.push(format!("\n... and {} more items", items.len() - DISPLAY_LIMIT));
    }
    lines.join("\n")
}

pub fn warehouse_transfer(result: &Value, _mode: OutputMode) -> String {
    if result.get("success").and_then(Value::as_bool).unwrap_or(false) {
        format!(
            "Transferred {} units of {} to main stock",
            u64_of(result, "quantity_transferred"),
            str_of(result, "product_name"),
        )
    } else {
        let error = str_of(result, "error");
        let error = if error.is_empty() { "Unknown error" } else { error };
        format!("Failed to transfer: {error}")
    }
}

pub fn sales_trends(result: &Value, mode: OutputMode) -> String {
    let products = arr_of(result, "top_selling_products");
    let period = u64_of(result, "period_days");
    let total = u64_of(result, "total_products_sold");

    if mode == OutputMode::Summary {
        return format!("Sales analysis: {total} products sold in {period} days");
    }
    if products.is_empty() {
        return format!("No sales data found for the last {period} days.");
    }
    let mut lines = vec![format!("Sales analysis (last {period} days) - {total} products sold:\n")];
    lines.push("Top selling products:".to_string());
    for (i, p) in products.iter().take(DISPLAY_LIMIT).enumerate() {
        lines.push(format!(
            "{}. **{}** - {} units sold (${:.2})",
            i + 1,
            str_of(p, "product_name"),
            u64_of(p, "total_quantity"),
            f64_of(p, "total_revenue"),
        ));
    }
    lines.join("\n")
}

pub fn reorder_suggestions(result: &Value, mode: OutputMode) -> String {
    let suggestions = arr_of(result, "suggestions");
    let total_cost = f64_of(result, "total_estimated_cost");
    let period = u64_of(result, "analysis_period_days");

    if mode == OutputMode::Summary {
        return format!(
            "Reorder suggestions: {} items, estimated cost ${total_cost:.2}",
            suggestions.len()
        );
    }
    if suggestions.is_empty() {
        return "No reorder suggestions at this time. All inventory levels are adequate."
            .to_string();
    }
    let mut lines = vec![format!("Reorder suggestions (based on {period}-day sales trends):\n")];
    for s in suggestions.iter().take(DISPLAY_LIMIT) {
        lines.push(format!(
            "- **{}** - Order {} units (Current: {}, Daily sales: {})",
            str_of(s, "name"),
            u64_of(s, "suggested_reorder_qty"),
            u64_of(s, "current_stock"),
            f64_of(s, "daily_sales_velocity"),
        ));
        lines.push(format!("  Estimated cost: ${:.2}", f64_of(s, "estimated_cost")));
    }
    lines.push(format!("\n**Total estimated cost: ${total_cost:.2}**"));
    lines.join("\n")
}
