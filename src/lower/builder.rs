//! Graph compiler: materialize a validated flow on the remote engine.
//!
//! The engine has no multi-step transaction, so compilation is a saga.
//! Creating the shell is the only committed side effect; any later failure
//! (or timeout) deletes the shell once and re-raises the original error.
//! [`GraphCompiler::compile_shared`] also deletes it when the caller drops
//! the future mid-build. Mutations are issued strictly one after another:
//! each step is appended to a parent that the previous call created.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::engine::{AddActionRequest, EngineClient, StepLocation};
use crate::error::{EngineError, EngineFailure};
use crate::ir::*;

use super::step::lower_step;
use super::trigger::{TRIGGER_STEP, lower_trigger};

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub auto_publish: bool,
    pub default_timezone: String,
    /// Public base URL used to build [`CompiledFlow::url`].
    pub base_url: String,
    pub folder_id: Option<String>,
    /// Deadline for everything after shell creation.
    pub timeout: Option<Duration>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            auto_publish: false,
            default_timezone: "Asia/Riyadh".into(),
            base_url: String::new(),
            folder_id: None,
            timeout: None,
        }
    }
}

/// Where the next step attaches. Passed by value so sibling arms never
/// share cursor state.
#[derive(Debug, Clone)]
struct Cursor {
    parent: String,
    slot: BranchSlot,
}

impl Cursor {
    fn root() -> Self {
        Cursor {
            parent: TRIGGER_STEP.into(),
            slot: BranchSlot::None,
        }
    }

    fn location(&self) -> StepLocation {
        match self.slot {
            BranchSlot::None => StepLocation::After,
            BranchSlot::TrueBranch => StepLocation::InsideTrueBranch,
            BranchSlot::FalseBranch => StepLocation::InsideFalseBranch,
        }
    }
}

/// Deterministic step names: `step_{n}` at the top level and
/// `{branch}_true_{k}` / `{branch}_false_{k}` inside a branch.
#[derive(Debug, Clone)]
enum Scope {
    Root,
    Arm { branch: String, side: &'static str },
}

impl Scope {
    fn step_name(&self, position: usize) -> String {
        match self {
            Scope::Root => format!("step_{position}"),
            Scope::Arm { branch, side } => format!("{branch}_{side}_{position}"),
        }
    }

    /// Every step inside an arm carries index 0, including those chained
    /// `AFTER` a sibling in the same arm.
    fn branch_index(&self) -> Option<u32> {
        matches!(self, Scope::Arm { .. }).then_some(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphCompiler {
    options: CompileOptions,
}

impl GraphCompiler {
    pub fn new(options: CompileOptions) -> Self {
        GraphCompiler { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile against a borrowed engine. Failures and timeouts roll the
    /// shell back, but dropping this future mid-build leaves it behind; use
    /// [`compile_shared`](Self::compile_shared) when the caller may cancel.
    pub async fn compile(
        &self,
        flow: &FlowDescriptor,
        engine: &dyn EngineClient,
    ) -> Result<CompiledFlow, EngineError> {
        let flow_id = self.create_shell(flow, engine).await?;
        let outcome = self.build(&flow_id, flow, engine).await;
        self.settle(flow_id, outcome, engine).await
    }

    /// Like [`compile`](Self::compile), and if the future is dropped after
    /// the shell exists, the shell is deleted on a spawned task.
    pub async fn compile_shared(
        &self,
        flow: &FlowDescriptor,
        engine: Arc<dyn EngineClient>,
    ) -> Result<CompiledFlow, EngineError> {
        let flow_id = self.create_shell(flow, engine.as_ref()).await?;
        let mut guard = RollbackOnDrop::arm(Arc::clone(&engine), &flow_id);
        let outcome = self.build(&flow_id, flow, engine.as_ref()).await;
        guard.disarm();
        self.settle(flow_id, outcome, engine.as_ref()).await
    }

    async fn create_shell(
        &self,
        flow: &FlowDescriptor,
        engine: &dyn EngineClient,
    ) -> Result<String, EngineError> {
        let shell = engine
            .create_flow(&flow.display_name, self.options.folder_id.as_deref())
            .await?;
        info!(flow_id = %shell.id, name = %flow.display_name, "flow shell created");
        Ok(shell.id)
    }

    /// Everything after the shell, under the configured deadline.
    async fn build(
        &self,
        flow_id: &str,
        flow: &FlowDescriptor,
        engine: &dyn EngineClient,
    ) -> Result<Vec<CompiledStep>, EngineError> {
        let build = self.materialize(flow_id, flow, engine);
        match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, build).await {
                Ok(outcome) => outcome,
                Err(_) => Err(EngineError::new(
                    "POST",
                    format!("/api/v1/flows/{flow_id}"),
                    EngineFailure::Timeout,
                )),
            },
            None => build.await,
        }
    }

    async fn settle(
        &self,
        flow_id: String,
        outcome: Result<Vec<CompiledStep>, EngineError>,
        engine: &dyn EngineClient,
    ) -> Result<CompiledFlow, EngineError> {
        match outcome {
            Ok(steps) => {
                let status = if self.options.auto_publish {
                    FlowStatus::Published
                } else {
                    FlowStatus::Draft
                };
                info!(flow_id = %flow_id, steps = steps.len(), ?status, "flow compiled");
                Ok(CompiledFlow {
                    url: format!(
                        "{}/flows/{flow_id}",
                        self.options.base_url.trim_end_matches('/')
                    ),
                    flow_id,
                    step_count: steps.len(),
                    status,
                })
            }
            Err(err) => {
                warn!(flow_id = %flow_id, error = %err, "compilation failed, rolling back");
                rollback(&flow_id, engine).await;
                Err(err)
            }
        }
    }

    async fn materialize(
        &self,
        flow_id: &str,
        flow: &FlowDescriptor,
        engine: &dyn EngineClient,
    ) -> Result<Vec<CompiledStep>, EngineError> {
        engine
            .update_trigger(
                flow_id,
                lower_trigger(&flow.trigger, &self.options.default_timezone),
            )
            .await?;
        debug!(flow_id, "trigger updated");

        let mut steps = Vec::new();
        compile_sequence(
            engine,
            flow_id,
            &flow.actions,
            Cursor::root(),
            Scope::Root,
            &mut steps,
        )
        .await?;

        if self.options.auto_publish {
            engine.publish(flow_id).await?;
            debug!(flow_id, "flow published");
        }
        Ok(steps)
    }
}

/// Append `actions` in order starting at `cursor`. A branch recurses into
/// both arms and then becomes the parent of the next sibling.
fn compile_sequence<'a>(
    engine: &'a dyn EngineClient,
    flow_id: &'a str,
    actions: &'a [Action],
    mut cursor: Cursor,
    scope: Scope,
    steps: &'a mut Vec<CompiledStep>,
) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async move {
        for (i, action) in actions.iter().enumerate() {
            let name = scope.step_name(i + 1);

            engine
                .add_action(
                    flow_id,
                    AddActionRequest {
                        parent_step: cursor.parent.clone(),
                        step_location_relative_to_parent: cursor.location(),
                        branch_index: scope.branch_index(),
                        action: lower_step(&name, action),
                    },
                )
                .await?;
            debug!(flow_id, step = %name, parent = %cursor.parent, "step added");

            steps.push(CompiledStep {
                name: name.clone(),
                parent_name: cursor.parent.clone(),
                branch_slot: cursor.slot,
                kind: action.kind(),
            });

            if let Action::Branch(branch) = action {
                for (children, slot, side) in [
                    (&branch.on_true, BranchSlot::TrueBranch, "true"),
                    (&branch.on_false, BranchSlot::FalseBranch, "false"),
                ] {
                    compile_sequence(
                        engine,
                        flow_id,
                        children,
                        Cursor {
                            parent: name.clone(),
                            slot,
                        },
                        Scope::Arm {
                            branch: name.clone(),
                            side,
                        },
                        &mut *steps,
                    )
                    .await?;
                }
            }

            cursor = Cursor {
                parent: name,
                slot: BranchSlot::None,
            };
        }
        Ok(())
    })
}

/// Best-effort compensating delete. Failures are logged, never raised.
async fn rollback(flow_id: &str, engine: &dyn EngineClient) {
    match engine.delete_flow(flow_id).await {
        Ok(()) => info!(flow_id, "partial flow deleted"),
        Err(err) => warn!(flow_id, error = %err, "could not delete partial flow"),
    }
}

/// Deletes the shell if dropped while still armed.
struct RollbackOnDrop {
    engine: Arc<dyn EngineClient>,
    flow_id: Option<String>,
}

impl RollbackOnDrop {
    fn arm(engine: Arc<dyn EngineClient>, flow_id: &str) -> Self {
        RollbackOnDrop {
            engine,
            flow_id: Some(flow_id.to_string()),
        }
    }

    fn disarm(&mut self) {
        self.flow_id = None;
    }
}

impl Drop for RollbackOnDrop {
    fn drop(&mut self) {
        let Some(flow_id) = self.flow_id.take() else {
            return;
        };
        warn!(flow_id = %flow_id, "compilation abandoned, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = Arc::clone(&self.engine);
                handle.spawn(async move { rollback(&flow_id, engine.as_ref()).await });
            }
            Err(_) => warn!(flow_id = %flow_id, "no runtime left, partial flow not deleted"),
        }
    }
}
