//! 计划执行器
//!
//! 顺序：依赖未满足即记录错误并中止其余步骤。并行：各步骤独立尝试，失败不拦截
//! 同伴，成功结果照常返回；结果表由执行器在 join 后逐键写入，单键单写者。
//! 条件：步骤结果经命名谓词判定，false 即合成"无需处理"的成功返回。
//! 计划独立于网关执行，工具调用不写对话历史。

use std::collections::HashMap;

use futures_util::future::join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::plan::predicate::PredicateRegistry;
use crate::plan::types::{PlanKind, PlanRun, StepOutcome, TaskPlan, TaskStep};
use crate::tools::{ExecutionScope, ToolDispatcher};

pub struct PlanExecutor {
    predicates: PredicateRegistry,
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self {
            predicates: PredicateRegistry::new(),
        }
    }
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run(
        &self,
        plan: &TaskPlan,
        dispatcher: &ToolDispatcher,
        scope: &dyn ExecutionScope,
    ) -> PlanRun {
        let plan_id = format!("plan_{}", Uuid::new_v4());
        tracing::info!(
            plan_id = %plan_id,
            kind = ?plan.kind,
            steps = plan.steps.len(),
            description = %plan.description,
            "executing task plan"
        );

        let mut run = match plan.kind {
            PlanKind::Sequential => self.run_ordered(plan, dispatcher, scope, false).await,
            PlanKind::Conditional => self.run_ordered(plan, dispatcher, scope, true).await,
            PlanKind::Parallel => self.run_parallel(plan, dispatcher, scope).await,
        };
        run.plan_id = plan_id;

        if !run.success {
            tracing::warn!(plan_id = %run.plan_id, message = %run.message, "task plan failed");
        }
        run
    }

    /// 顺序 / 条件计划共用的有序执行；conditional 打开谓词短路
    async fn run_ordered(
        &self,
        plan: &TaskPlan,
        dispatcher: &ToolDispatcher,
        scope: &dyn ExecutionScope,
        conditional: bool,
    ) -> PlanRun {
        let mut results: HashMap<String, Value> = HashMap::new();
        let mut steps: Vec<StepOutcome> = Vec::new();
        let mut aborted = false;
        let mut short_circuited = false;

        for (index, step) in plan.steps.iter().enumerate() {
            if let Some(dep) = &step.depends_on {
                if !results.contains_key(dep) {
                    steps.push(StepOutcome {
                        tool_name: step.tool_name.clone(),
                        description: step.description.clone(),
                        result: None,
                        error: Some(format!("dependency '{dep}' not satisfied")),
                        skipped: true,
                    });
                    aborted = true;
                    mark_remaining_skipped(&plan.steps[index + 1..], &mut steps);
                    break;
                }
            }

            match dispatcher
                .invoke(&step.tool_name, step.parameters.clone(), scope)
                .await
            {
                Ok(result) => {
                    if let Some(key) = &step.save_result_as {
                        results.insert(key.clone(), result.clone());
                    }

                    if conditional {
                        if let Some(predicate) = &step.condition {
                            match self.predicates.evaluate(predicate, &result) {
                                Ok(true) => {}
                                Ok(false) => {
                                    steps.push(ok_outcome(step, result));
                                    mark_remaining_skipped(&plan.steps[index + 1..], &mut steps);
                                    short_circuited = true;
                                    break;
                                }
                                Err(error) => {
                                    steps.push(StepOutcome {
                                        tool_name: step.tool_name.clone(),
                                        description: step.description.clone(),
                                        result: Some(result),
                                        error: Some(error),
                                        skipped: false,
                                    });
                                    aborted = true;
                                    mark_remaining_skipped(&plan.steps[index + 1..], &mut steps);
                                    break;
                                }
                            }
                        }
                    }

                    steps.push(ok_outcome(step, result));
                }
                Err(error) => {
                    steps.push(StepOutcome {
                        tool_name: step.tool_name.clone(),
                        description: step.description.clone(),
                        result: None,
                        error: Some(error),
                        skipped: false,
                    });
                }
            }
        }

        if short_circuited {
            return PlanRun {
                plan_id: String::new(),
                success: true,
                message: "No action needed - everything is in order.".to_string(),
                results,
                steps,
            };
        }

        let errors: Vec<&StepOutcome> = steps.iter().filter(|s| s.error.is_some()).collect();
        let success = !aborted && errors.is_empty();
        let message = if success {
            format!("Completed {} steps: {}", steps.len(), plan.description)
        } else if aborted {
            "Plan aborted: a step dependency was not satisfied.".to_string()
        } else {
            format!("Plan completed with {} failed step(s).", errors.len())
        };

        PlanRun {
            plan_id: String::new(),
            success,
            message,
            results,
            steps,
        }
    }

    async fn run_parallel(
        &self,
        plan: &TaskPlan,
        dispatcher: &ToolDispatcher,
        scope: &dyn ExecutionScope,
    ) -> PlanRun {
        let invocations = plan.steps.iter().map(|step| async move {
            let outcome = dispatcher
                .invoke(&step.tool_name, step.parameters.clone(), scope)
                .await;
            (step, outcome)
        });
        let joined = join_all(invocations).await;

        let mut results: HashMap<String, Value> = HashMap::new();
        let mut steps: Vec<StepOutcome> = Vec::new();
        for (step, outcome) in joined {
            match outcome {
                Ok(result) => {
                    if let Some(key) = &step.save_result_as {
                        results.insert(key.clone(), result.clone());
                    }
                    steps.push(ok_outcome(step, result));
                }
                Err(error) => steps.push(StepOutcome {
                    tool_name: step.tool_name.clone(),
                    description: step.description.clone(),
                    result: None,
                    error: Some(error),
                    skipped: false,
                }),
            }
        }

        let failures: Vec<String> = steps
            .iter()
            .filter_map(|s| s.error.as_ref().map(|e| format!("{}: {e}", s.tool_name)))
            .collect();
        let success = failures.is_empty();
        let message = if success {
            format!("Completed {} steps: {}", steps.len(), plan.description)
        } else {
            format!(
                "Completed {} of {} steps; failures: {}",
                steps.len() - failures.len(),
                steps.len(),
                failures.join("; ")
            )
        };

        PlanRun {
            plan_id: String::new(),
            success,
            message,
            results,
            steps,
        }
    }
}

fn ok_outcome(step: &TaskStep, result: Value) -> StepOutcome {
    StepOutcome {
        tool_name: step.tool_name.clone(),
        description: step.description.clone(),
        result: Some(result),
        error: None,
        skipped: false,
    }
}

fn mark_remaining_skipped(remaining: &[TaskStep], steps: &mut Vec<StepOutcome>) {
    for step in remaining {
        steps.push(StepOutcome {
            tool_name: step.tool_name.clone(),
            description: step.description.clone(),
            result: None,
            error: None,
            skipped: true,
        });
    }
}
