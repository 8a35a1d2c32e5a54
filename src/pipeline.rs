//! End-to-end orchestration.
//!
//! `generate` / `modify`: producer → validate → (repair) → guard.
//! `deploy`: re-check → guard → compile.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::catalog::CatalogRegistry;
use crate::engine::{Connection, EngineClient};
use crate::error::{self, Finding, FlowError, Issue};
use crate::ir::{CompiledFlow, FlowDescriptor};
use crate::lower::GraphCompiler;
use crate::repair::{ChatMessage, RepairLoop, RepairOutcome};
use crate::safety::guard_with;
use crate::validate::{Limits, check_flow};

pub const DEFAULT_FLOW_LIST_LIMIT: usize = 50;
pub const DEFAULT_RUN_LIST_LIMIT: usize = 10;

/// An accepted flow and every non-blocking finding about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub flow: FlowDescriptor,
    pub warnings: Vec<Issue>,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub compiled: CompiledFlow,
    pub warnings: Vec<Issue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub connected: Vec<String>,
    pub missing: Vec<String>,
}

impl ConnectionReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct Pipeline {
    repair: RepairLoop,
    catalog: Arc<CatalogRegistry>,
    engine: Arc<dyn EngineClient>,
    compiler: GraphCompiler,
    limits: Limits,
}

impl Pipeline {
    pub fn new(
        repair: RepairLoop,
        catalog: Arc<CatalogRegistry>,
        engine: Arc<dyn EngineClient>,
        compiler: GraphCompiler,
    ) -> Self {
        Pipeline {
            repair,
            catalog,
            engine,
            compiler,
            limits: Limits::default(),
        }
    }

    /// Also applied to the repair loop.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.repair = self.repair.with_limits(limits);
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &Arc<CatalogRegistry> {
        &self.catalog
    }

    pub fn engine(&self) -> &Arc<dyn EngineClient> {
        &self.engine
    }

    #[instrument(skip_all)]
    pub async fn generate(
        &self,
        request: &str,
        context: &[ChatMessage],
    ) -> Result<Generated, FlowError> {
        let catalog = self.catalog.snapshot();
        let outcome = self.repair.run(request, context, &catalog).await?;
        self.accept(outcome)
    }

    /// Produce a new flow from `current` and a change request. `current` is not touched.
    #[instrument(skip_all)]
    pub async fn modify(
        &self,
        current: &FlowDescriptor,
        instruction: &str,
        context: &[ChatMessage],
    ) -> Result<Generated, FlowError> {
        let current_json = serde_json::to_string_pretty(current)
            .map_err(|e| FlowError::Schema(vec![Issue::schema("S001", e.to_string(), None)]))?;
        let request = format!(
            "Modify this existing flow and reply with the complete updated JSON.\n\nCurrent flow:\n{current_json}\n\nChange: {instruction}"
        );
        self.generate(&request, context).await
    }

    fn accept(&self, outcome: RepairOutcome) -> Result<Generated, FlowError> {
        match outcome {
            RepairOutcome::Rejected {
                errors,
                user_error: true,
                ..
            } => Err(FlowError::Refused(
                errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
            RepairOutcome::Rejected { errors, .. } => Err(FlowError::Schema(errors)),
            RepairOutcome::Accepted {
                flow,
                mut warnings,
                repaired,
            } => {
                let safety = guard_with(&flow, &self.limits);
                if safety.is_blocked() {
                    return Err(FlowError::SafetyBlock(safety.blocks().cloned().collect()));
                }
                warnings.extend(safety.warnings().cloned());
                Ok(Generated {
                    flow,
                    warnings,
                    repaired,
                })
            }
        }
    }

    /// Check and materialize an accepted flow.
    #[instrument(skip_all, fields(name = %flow.display_name))]
    pub async fn deploy(&self, flow: &FlowDescriptor) -> Result<Deployment, FlowError> {
        let catalog = self.catalog.snapshot();
        let mut findings = check_flow(flow, &catalog, &self.limits);
        let errors: Vec<Issue> = error::blocking(&findings).cloned().collect();
        if !errors.is_empty() {
            return Err(FlowError::Schema(errors));
        }

        let safety = guard_with(flow, &self.limits);
        if safety.is_blocked() {
            return Err(FlowError::SafetyBlock(safety.blocks().cloned().collect()));
        }
        findings.extend(safety.findings);

        let compiled = self
            .compiler
            .compile_shared(flow, Arc::clone(&self.engine))
            .await?;
        info!(flow_id = %compiled.flow_id, "flow deployed");
        Ok(Deployment {
            compiled,
            warnings: findings
                .into_iter()
                .filter_map(|f| match f {
                    Finding::Advisory(issue) => Some(issue),
                    Finding::Blocking(_) => None,
                })
                .collect(),
        })
    }

    /// Which of `needed` (piece names) have a connection in the project.
    pub async fn check_connections(&self, needed: &[String]) -> Result<ConnectionReport, FlowError> {
        let connections = self.engine.list_connections().await?;
        Ok(match_connections(needed, &connections))
    }

    // -------------------------------------------------------------------------
    // Flow management
    // -------------------------------------------------------------------------

    pub async fn publish(&self, flow_id: &str) -> Result<(), FlowError> {
        Ok(self.engine.publish(flow_id).await?)
    }

    pub async fn set_enabled(&self, flow_id: &str, enabled: bool) -> Result<(), FlowError> {
        Ok(self.engine.set_status(flow_id, enabled).await?)
    }

    pub async fn delete(&self, flow_id: &str) -> Result<(), FlowError> {
        Ok(self.engine.delete_flow(flow_id).await?)
    }

    pub async fn get_flow(&self, flow_id: &str) -> Result<serde_json::Value, FlowError> {
        Ok(self.engine.get_flow(flow_id).await?)
    }

    pub async fn list_flows(&self, limit: Option<usize>) -> Result<serde_json::Value, FlowError> {
        Ok(self
            .engine
            .list_flows(limit.unwrap_or(DEFAULT_FLOW_LIST_LIMIT))
            .await?)
    }

    pub async fn list_connections(&self) -> Result<Vec<Connection>, FlowError> {
        Ok(self.engine.list_connections().await?)
    }

    pub async fn list_runs(
        &self,
        flow_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<serde_json::Value, FlowError> {
        Ok(self
            .engine
            .list_runs(flow_id, limit.unwrap_or(DEFAULT_RUN_LIST_LIMIT))
            .await?)
    }
}

/// A needed piece is covered when some connection's piece name contains it
/// (or the reverse), ignoring case.
fn match_connections(needed: &[String], connections: &[Connection]) -> ConnectionReport {
    let mut report = ConnectionReport::default();
    for piece in needed {
        let wanted = piece.to_lowercase();
        let covered = connections.iter().any(|c| {
            let have = c.piece_name.to_lowercase();
            !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
        });
        if covered {
            report.connected.push(piece.clone());
        } else {
            report.missing.push(piece.clone());
        }
    }
    report
}
