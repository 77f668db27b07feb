//! 条件计划的命名谓词
//!
//! 小而显式的注册表；未知谓词名是步骤错误而非悄悄判 false。

use std::collections::HashMap;

use serde_json::Value;

pub type Predicate = fn(&Value) -> bool;

fn non_empty_array(value: &Value, key: &str) -> bool {
    value
        .get(key)
        .and_then(Value::as_array)
        .is_some_and(|a| !a.is_empty())
}

/// 谓词注册表，默认含集合非空类谓词（has_items / has_orders / has_suggestions）
pub struct PredicateRegistry {
    predicates: HashMap<&'static str, Predicate>,
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        let mut predicates: HashMap<&'static str, Predicate> = HashMap::new();
        predicates.insert("has_items", |v| non_empty_array(v, "items"));
        predicates.insert("has_orders", |v| non_empty_array(v, "orders"));
        predicates.insert("has_suggestions", |v| non_empty_array(v, "suggestions"));
        Self { predicates }
    }
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对步骤结果求值；未知谓词名返回 Err
    pub fn evaluate(&self, name: &str, result: &Value) -> Result<bool, String> {
        match self.predicates.get(name) {
            Some(predicate) => Ok(predicate(result)),
            None => Err(format!("unknown predicate '{name}'")),
        }
    }
}
