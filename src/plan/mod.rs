//! 任务规划与执行：规则表匹配多步工作流，独立于模型网关运行

pub mod executor;
pub mod predicate;
pub mod rules;
pub mod types;

pub use executor::PlanExecutor;
pub use predicate::PredicateRegistry;
pub use rules::TaskPlanner;
pub use types::{PlanKind, PlanRun, StepOutcome, TaskPlan, TaskStep};
