//! 标准工具目录与类别过滤
//!
//! 库存 / 采购工具套件的描述符（名称、说明、参数 schema）与逐工具格式化器在此集中定义；
//! 可调用本体由宿主在注册时注入。类别表按关键词命中收窄发给网关的工具集，
//! 零命中视为复杂 / 含糊指令，退回完整注册表；这是成本取舍而非正确性过滤。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::tools::format;
use crate::tools::registry::{
    RegistryError, ResultFormatter, Tool, ToolDescriptor, ToolRegistry,
};

/// 类别：工具名集合 + 触发关键词（对小写化指令做子串匹配）
pub struct ToolCategory {
    pub name: &'static str,
    pub tools: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

pub const CATEGORIES: &[ToolCategory] = &[
    ToolCategory {
        name: "inventory",
        tools: &[
            "get_inventory_status",
            "get_low_stock_items",
            "get_product_details",
        ],
        keywords: &["inventory", "stock", "product", "item", "barcode"],
    },
    ToolCategory {
        name: "suppliers",
        tools: &[
            "get_supplier_list",
            "get_supplier_details",
            "get_supplier_price_for_product",
        ],
        keywords: &["supplier", "vendor"],
    },
    ToolCategory {
        name: "purchasing",
        tools: &[
            "get_purchase_orders",
            "create_purchase_order",
            "approve_purchase_order",
            "cancel_purchase_order",
        ],
        keywords: &["purchase", "order", "procurement", "approve", "cancel"],
    },
    ToolCategory {
        name: "warehouse",
        tools: &["get_warehouse_inventory", "create_warehouse_transfer"],
        keywords: &["warehouse", "transfer", "unstocked"],
    },
    ToolCategory {
        name: "sales",
        tools: &["get_sales_trends"],
        keywords: &["sales", "trend", "seller", "selling"],
    },
    ToolCategory {
        name: "reorder",
        tools: &["get_low_stock_items", "suggest_reorder_quantities"],
        keywords: &["reorder", "restock", "replenish"],
    },
];

/// 返回命中类别的工具描述符并集；零命中返回完整注册表
pub fn relevant_subset(command: &str, registry: &ToolRegistry) -> Vec<ToolDescriptor> {
    let lowered = command.to_lowercase();
    let mut names: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for category in CATEGORIES {
        if category.keywords.iter().any(|kw| lowered.contains(kw)) {
            for tool in category.tools {
                if seen.insert(tool) {
                    names.push(tool);
                }
            }
        }
    }

    if names.is_empty() {
        return registry.descriptors();
    }
    names
        .iter()
        .filter_map(|name| registry.descriptor(name).cloned())
        .collect()
}

/// 标准工具的格式化器；未列出的工具用兜底渲染
pub fn formatter_for(name: &str) -> Option<ResultFormatter> {
    match name {
        "get_low_stock_items" => Some(format::low_stock),
        "get_inventory_status" => Some(format::inventory_status),
        "get_supplier_list" => Some(format::supplier_list),
        "get_purchase_orders" => Some(format::purchase_orders),
        "create_purchase_order" => Some(format::create_purchase_order),
        "approve_purchase_order" => Some(format::approve_purchase_order),
        "cancel_purchase_order" => Some(format::cancel_purchase_order),
        "get_warehouse_inventory" => Some(format::warehouse_inventory),
        "create_warehouse_transfer" => Some(format::warehouse_transfer),
        "get_sales_trends" => Some(format::sales_trends),
        "suggest_reorder_quantities" => Some(format::reorder_suggestions),
        _ => None,
    }
}

/// 按标准目录注册一个工具：绑定目录中的描述符与格式化器，宿主只提供可调用
pub fn register_standard(
    registry: &mut ToolRegistry,
    name: &str,
    handler: Arc<dyn Tool>,
) -> Result<(), RegistryError> {
    let descriptor = descriptor(name)
        .unwrap_or_else(|| ToolDescriptor::new(name, "", json!({"type": "object", "properties": {}})));
    registry.register_with_formatter(descriptor, handler, formatter_for(name))
}

/// 标准目录中全部工具名
pub fn standard_names() -> Vec<&'static str> {
    vec![
        "get_inventory_status",
        "get_low_stock_items",
        "get_supplier_list",
        "get_supplier_details",
        "get_purchase_orders",
        "create_purchase_order",
        "approve_purchase_order",
        "cancel_purchase_order",
        "get_warehouse_inventory",
        "create_warehouse_transfer",
        "get_sales_trends",
        "get_product_details",
        "suggest_reorder_quantities",
        "get_supplier_price_for_product",
    ]
}

/// 标准工具的描述符；名称不在目录中返回 None
pub fn descriptor(name: &str) -> Option<ToolDescriptor> {
    let (description, parameters) = match name {
        "get_inventory_status" => (
            "Get the current inventory status for all products or a specific product. \
             Returns stock levels, reorder points, and stock status.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "Optional product ID to get status for a specific product. If not provided, returns all products."},
                    "category": {"type": "string", "description": "Optional category filter to get products in a specific category."},
                    "low_stock_only": {"type": "boolean", "description": "If true, only returns products with stock at or below reorder point."}
                }
            }),
        ),
        "get_low_stock_items" => (
            "Get a list of all products that are low on stock (at or below reorder point) \
             or out of stock. Includes suggested reorder quantities.",
            json!({"type": "object", "properties": {}}),
        ),
        "get_supplier_list" => (
            "Get a list of all suppliers with their details including contact info, \
             ratings, and performance metrics.",
            json!({
                "type": "object",
                "properties": {
                    "active_only": {"type": "boolean", "description": "If true, only returns active suppliers."},
                    "category": {"type": "string", "description": "Optional category filter for suppliers."}
                }
            }),
        ),
        "get_supplier_details" => (
            "Get detailed information about a specific supplier including their price \
             agreements and order history.",
            json!({
                "type": "object",
                "properties": {
                    "supplier_id": {"type": "integer", "description": "The ID of the supplier to get details for."}
                },
                "required": ["supplier_id"]
            }),
        ),
        "get_purchase_orders" => (
            "Get a list of purchase orders with optional filtering by status, supplier, \
             or date range.",
            json!({
                "type": "object",
                "properties": {
                    "status": {"type": "string", "description": "Filter by status: draft, pending, approved, partially_received, received, cancelled"},
                    "supplier_id": {"type": "integer", "description": "Filter by supplier ID."},
                    "limit": {"type": "integer", "description": "Maximum number of orders to return. Default is 50."}
                }
            }),
        ),
        "create_purchase_order" => (
            "Create a new purchase order for one or more products. Automatically \
             calculates totals and generates PO number.",
            json!({
                "type": "object",
                "properties": {
                    "supplier_id": {"type": "integer", "description": "The ID of the supplier to order from."},
                    "items": {
                        "type": "array",
                        "description": "List of items to order. Each item should have product_id, quantity, and optionally unit_cost.",
                        "items": {
                            "type": "object",
                            "properties": {
                                "product_id": {"type": "integer"},
                                "quantity": {"type": "integer"},
                                "unit_cost": {"type": "number"}
                            },
                            "required": ["product_id", "quantity"]
                        }
                    },
                    "expected_delivery_date": {"type": "string", "description": "Expected delivery date in YYYY-MM-DD format."},
                    "notes": {"type": "string", "description": "Optional notes for the purchase order."}
                },
                "required": ["supplier_id", "items"]
            }),
        ),
        "approve_purchase_order" => (
            "Approve a pending purchase order. Changes status from 'pending' to 'approved'.",
            json!({
                "type": "object",
                "properties": {
                    "po_id": {"type": "integer", "description": "The ID of the purchase order to approve."}
                },
                "required": ["po_id"]
            }),
        ),
        "cancel_purchase_order" => (
            "Cancel a purchase order. Can only cancel orders in draft, pending, or \
             approved status.",
            json!({
                "type": "object",
                "properties": {
                    "po_id": {"type": "integer", "description": "The ID of the purchase order to cancel."},
                    "reason": {"type": "string", "description": "Reason for cancellation."}
                },
                "required": ["po_id", "reason"]
            }),
        ),
        "get_warehouse_inventory" => (
            "Get the current warehouse inventory status. Shows products received but \
             not yet transferred to main stock.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "Optional product ID to filter by specific product."}
                }
            }),
        ),
        "create_warehouse_transfer" => (
            "Transfer products from warehouse inventory to main product stock. Reduces \
             warehouse quantity and increases main stock.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "The ID of the product to transfer."},
                    "quantity": {"type": "integer", "description": "The quantity to transfer from warehouse to main stock."},
                    "notes": {"type": "string", "description": "Optional notes for the transfer."}
                },
                "required": ["product_id", "quantity"]
            }),
        ),
        "get_sales_trends" => (
            "Get sales trend analysis for products over a specified time period. Useful \
             for making reorder decisions.",
            json!({
                "type": "object",
                "properties": {
                    "days": {"type": "integer", "description": "Number of days to analyze. Default is 30."},
                    "product_id": {"type": "integer", "description": "Optional product ID to get trends for a specific product."},
                    "top_n": {"type": "integer", "description": "Return top N best selling products. Default is 10."}
                }
            }),
        ),
        "get_product_details" => (
            "Get detailed information about a specific product including stock, pricing, \
             and supplier information.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "The ID of the product."},
                    "barcode": {"type": "string", "description": "Alternative: the barcode of the product."}
                }
            }),
        ),
        "suggest_reorder_quantities" => (
            "Analyze inventory and sales trends to suggest optimal reorder quantities \
             for low stock items.",
            json!({"type": "object", "properties": {}}),
        ),
        "get_supplier_price_for_product" => (
            "Get the agreed price for a product from a specific supplier, if a price \
             agreement exists.",
            json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "The ID of the product."},
                    "supplier_id": {"type": "integer", "description": "The ID of the supplier."}
                },
                "required": ["product_id", "supplier_id"]
            }),
        ),
        _ => return None,
    };
    Some(ToolDescriptor::new(name, description, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use crate::tools::registry::ExecutionScope;

    struct NullTool;

    #[async_trait]
    impl Tool for NullTool {
        async fn call(
            &self,
            _scope: &dyn ExecutionScope,
            _args: Map<String, Value>,
        ) -> Result<Value, String> {
            Ok(json!({}))
        }
    }

    fn full_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in standard_names() {
            register_standard(&mut registry, name, Arc::new(NullTool)).unwrap();
        }
        registry
    }

    #[test]
    fn supplier_command_narrows_to_supplier_tools() {
        let registry = full_registry();
        let subset = relevant_subset("check supplier contact info", &registry);
        let names: Vec<_> = subset.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get_supplier_list",
                "get_supplier_details",
                "get_supplier_price_for_product"
            ]
        );
    }

    #[test]
    fn unmatched_command_returns_full_registry() {
        let registry = full_registry();
        let subset = relevant_subset("do the quarterly thing", &registry);
        assert_eq!(subset.len(), registry.len());
    }

    #[test]
    fn hits_across_categories_union_their_tools() {
        let registry = full_registry();
        let subset = relevant_subset("reorder stock from our vendor", &registry);
        let names: HashSet<_> = subset.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains("get_low_stock_items"));
        assert!(names.contains("suggest_reorder_quantities"));
        assert!(names.contains("get_supplier_list"));
        assert!(names.contains("get_inventory_status"));
        assert!(!names.contains("get_warehouse_inventory"));
    }

    #[test]
    fn catalog_descriptors_cover_every_standard_name() {
        for name in standard_names() {
            assert!(descriptor(name).is_some(), "missing descriptor for {name}");
        }
    }
}
