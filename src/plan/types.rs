//! 任务计划类型
//!
//! TaskPlan 按指令逐次构建、执行后即弃；步骤以 save_result_as 键发布结果，
//! 以 depends_on 声明对先前结果的依赖，以 condition 命名短路谓词。

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// 计划的执行方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanKind {
    /// 按声明顺序执行，依赖未满足即中止其余步骤
    Sequential,
    /// 步骤相互独立，失败不影响同批其他步骤
    Parallel,
    /// 顺序执行，步骤结果经命名谓词判定，不满足即提前成功返回
    Conditional,
}

/// 计划中的一步：一次具名工具调用
#[derive(Clone, Debug)]
pub struct TaskStep {
    pub tool_name: String,
    pub description: String,
    pub parameters: Map<String, Value>,
    /// 先前结果表中必须存在的键；缺失时本步骤被跳过并中止顺序计划
    pub depends_on: Option<String>,
    /// 命名谓词：对本步骤结果求值，false 则计划提前成功返回
    pub condition: Option<String>,
    pub save_result_as: Option<String>,
}

impl TaskStep {
    pub fn new(tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            description: description.into(),
            parameters: Map::new(),
            depends_on: None,
            condition: None,
            save_result_as: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        if let Value::Object(map) = parameters {
            self.parameters = map;
        }
        self
    }

    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.depends_on = Some(key.into());
        self
    }

    pub fn condition(mut self, predicate: impl Into<String>) -> Self {
        self.condition = Some(predicate.into());
        self
    }

    pub fn save_as(mut self, key: impl Into<String>) -> Self {
        self.save_result_as = Some(key.into());
        self
    }
}

/// 规则匹配产出的多步工作流模板实例
#[derive(Clone, Debug)]
pub struct TaskPlan {
    pub kind: PlanKind,
    pub description: String,
    pub steps: Vec<TaskStep>,
    /// 触发本计划的原始指令
    pub command: String,
}

impl TaskPlan {
    pub fn new(
        kind: PlanKind,
        description: impl Into<String>,
        steps: Vec<TaskStep>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            steps,
            command: command.into(),
        }
    }
}

/// 单步执行结果；skipped 表示因依赖未满足或提前短路而未调用
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub tool_name: String,
    pub description: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub skipped: bool,
}

/// 一次计划执行的汇总
#[derive(Clone, Debug)]
pub struct PlanRun {
    pub plan_id: String,
    pub success: bool,
    pub message: String,
    /// save_result_as 键 → 成功步骤的结果
    pub results: HashMap<String, Value>,
    pub steps: Vec<StepOutcome>,
}
