//! The staged deployment executor.

use super::{ApplyEngine, StageRegistry};
use crate::config::PlatformConfig;
use crate::context::{StageInputs, StageOutputMap};
use crate::core::{PipelineReport, PipelineState, StageRecord, StageTransition};
use crate::errors::{DeployflowError, OutputContractError, PipelineFailure, SchemaValidationError};
use crate::events::{types, EventSink, NoOpEventSink};
use crate::health::HealthChecker;
use crate::stages::Stage;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Run-level switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Skip every post-apply check.
    pub skip_checks: bool,
}

impl ExecutorOptions {
    /// Enables or disables post-apply checks.
    #[must_use]
    pub const fn with_skip_checks(mut self, skip: bool) -> Self {
        self.skip_checks = skip;
        self
    }
}

/// Walks registered stages in priority order: resolve inputs, validate,
/// apply, validate outputs, record, check. The first failure halts the run.
///
/// There is no rollback. A [`PipelineFailure`] names the failing stage, the
/// state it failed in and the cause.
pub struct PipelineExecutor {
    registry: StageRegistry,
    engine: Arc<dyn ApplyEngine>,
    health: HealthChecker,
    events: Arc<dyn EventSink>,
    options: ExecutorOptions,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Where a stage failed, and why.
type StageFailure = (PipelineState, DeployflowError);

impl PipelineExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(registry: StageRegistry, engine: Arc<dyn ApplyEngine>, health: HealthChecker) -> Self {
        Self {
            registry,
            engine,
            health,
            events: Arc::new(NoOpEventSink),
            options: ExecutorOptions::default(),
        }
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets run options.
    #[must_use]
    pub const fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub const fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Runs every stage.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] for the first stage that reaches `FAILED`.
    pub async fn run(&self, config: &PlatformConfig) -> Result<PipelineReport, PipelineFailure> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("pipeline", %run_id);
        self.run_inner(run_id, config).instrument(span).await
    }

    async fn run_inner(&self, run_id: uuid::Uuid, config: &PlatformConfig) -> Result<PipelineReport, PipelineFailure> {
        let start = Instant::now();
        let stage_names: Vec<&str> = self.registry.ordered_stages().map(|s| s.name()).collect();
        info!(stages = stage_names.len(), "pipeline started");
        self.events
            .emit(types::PIPELINE_STARTED, Some(json!({"run_id": run_id, "stages": stage_names})))
            .await;

        let mut outputs = StageOutputMap::new();
        let mut records: Vec<StageRecord> = Vec::new();

        for stage in self.registry.ordered_stages() {
            let span = info_span!("stage", stage = stage.name(), priority = stage.priority());
            let started_at = Utc::now();
            let stage_start = Instant::now();

            match self.run_stage(stage.as_ref(), config, &mut outputs).instrument(span).await {
                Ok(checked) => records.push(StageRecord {
                    name: stage.name().to_string(),
                    priority: stage.priority(),
                    state: PipelineState::Done,
                    started_at,
                    duration_ms: stage_start.elapsed().as_secs_f64() * 1000.0,
                    checked,
                }),
                Err((state, cause)) => {
                    let completed = records.into_iter().map(|r| r.name).collect();
                    let failure = PipelineFailure::new(stage.name(), state, cause, completed);
                    error!(stage = %failure.stage, state = %failure.state, error = %failure.error, "pipeline failed");
                    self.events
                        .emit(
                            types::PIPELINE_FAILED,
                            Some(json!({
                                "run_id": run_id,
                                "stage": failure.stage,
                                "state": failure.state,
                                "error": failure.error.to_string(),
                                "error_code": failure.error.error_info().map(|i| i.code.clone()),
                                "retryable": failure.error.is_retryable(),
                                "completed": failure.completed,
                            })),
                        )
                        .await;
                    return Err(failure);
                }
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(duration_ms, "pipeline completed");
        self.events
            .emit(
                types::PIPELINE_COMPLETED,
                Some(json!({"run_id": run_id, "duration_ms": duration_ms})),
            )
            .await;

        Ok(PipelineReport {
            run_id,
            outputs,
            stages: records,
            duration_ms,
        })
    }

    /// Runs one stage from `Pending` to `Done`. Returns whether the check ran.
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        config: &PlatformConfig,
        outputs: &mut StageOutputMap,
    ) -> Result<bool, StageFailure> {
        let name = stage.name();
        let mut state = PipelineState::Pending;

        let result = async {
            self.advance(name, &mut state, PipelineState::ResolvingInputs).await;
            let dependencies = stage.dependencies();
            let variables = stage
                .input_vars(config, StageInputs::new(outputs, &dependencies, name))?;
            stage
                .input_schema()
                .validate(variables.as_map())
                .map_err(|v| SchemaValidationError::new(name, v.path, v.message))?;

            self.advance(name, &mut state, PipelineState::Applying).await;
            let resources = stage.resources(config);
            let raw = self.engine.apply(name, &resources, &variables).await?;
            stage
                .output_schema()
                .validate(&raw)
                .map_err(|v| OutputContractError::new(name, v.path, v.message))?;
            outputs.record(name, raw)?;

            self.advance(name, &mut state, PipelineState::Checking).await;
            let checked = if self.options.skip_checks {
                debug!(stage = name, "checks disabled");
                false
            } else {
                stage.check(outputs, &self.health).await?;
                true
            };

            self.advance(name, &mut state, PipelineState::Done).await;
            Ok::<bool, DeployflowError>(checked)
        }
        .await;

        match result {
            Ok(checked) => {
                info!(stage = name, checked, "stage completed");
                self.events
                    .emit(types::STAGE_COMPLETED, Some(json!({"stage": name, "checked": checked})))
                    .await;
                Ok(checked)
            }
            Err(cause) => {
                let failed_in = state;
                error!(stage = name, state = %failed_in, error = %cause, "stage failed");
                self.advance(name, &mut state, PipelineState::Failed).await;
                self.events
                    .emit(
                        types::STAGE_FAILED,
                        Some(json!({"stage": name, "state": failed_in, "error": cause.to_string()})),
                    )
                    .await;
                Err((failed_in, cause))
            }
        }
    }

    async fn advance(&self, stage: &str, state: &mut PipelineState, to: PipelineState) {
        let transition = StageTransition::new(*state, to);
        debug_assert!(transition.is_valid(), "illegal transition {} -> {}", transition.from, transition.to);
        debug!(stage, from = %transition.from, to = %transition.to, "stage transition");
        self.events
            .emit(
                types::STAGE_STATE,
                Some(json!({"stage": stage, "from": transition.from, "to": transition.to})),
            )
            .await;
        *state = to;
    }

    /// Runs the checks of every stage present in `outputs`, in order, as if
    /// each had just been applied.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] in the `Checking` state for the first
    /// failing check.
    pub async fn check_only(&self, outputs: &StageOutputMap) -> Result<Vec<String>, PipelineFailure> {
        let mut checked = Vec::new();
        for stage in self.registry.ordered_stages().filter(|s| outputs.contains(s.name())) {
            let span = info_span!("stage", stage = stage.name(), priority = stage.priority());
            if let Err(cause) = stage.check(outputs, &self.health).instrument(span).await {
                error!(stage = stage.name(), error = %cause, "check failed");
                return Err(PipelineFailure::new(stage.name(), PipelineState::Checking, cause, checked));
            }
            checked.push(stage.name().to_string());
        }
        Ok(checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApplyError;
    use crate::events::CollectingEventSink;
    use crate::pipeline::MockApplyEngine;
    use crate::testing::{ScriptedApplyEngine, ScriptedStage, StubProbe};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn health() -> HealthChecker {
        HealthChecker::new(Arc::new(StubProbe::always(Ok(200))))
    }

    fn registry(stages: Vec<ScriptedStage>) -> StageRegistry {
        let mut registry = StageRegistry::new();
        for stage in stages {
            registry.register(Arc::new(stage)).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_schema_violation_fails_before_apply() {
        let stage = ScriptedStage::new("a", 10)
            .with_input_schema(crate::contracts::Schema::new().required("region", crate::contracts::FieldKind::String));
        let mut engine = MockApplyEngine::new();
        engine.expect_apply().never();

        let executor = PipelineExecutor::new(registry(vec![stage]), Arc::new(engine), health());
        let failure = executor.run(&PlatformConfig::new("demo")).await.unwrap_err();

        assert_eq!(failure.state, PipelineState::ResolvingInputs);
        let DeployflowError::SchemaValidation(e) = &failure.error else {
            panic!("expected schema validation, got {}", failure.error);
        };
        assert_eq!(e.path, "region");
    }

    #[tokio::test]
    async fn test_apply_failure_halts_run() {
        let mut engine = MockApplyEngine::new();
        engine
            .expect_apply()
            .times(1)
            .returning(|stage, _, _| Err(ApplyError::new(stage, "boom")));

        let executor = PipelineExecutor::new(
            registry(vec![ScriptedStage::new("a", 10), ScriptedStage::new("b", 20)]),
            Arc::new(engine),
            health(),
        );
        let failure = executor.run(&PlatformConfig::new("demo")).await.unwrap_err();

        assert_eq!(failure.stage, "a");
        assert_eq!(failure.state, PipelineState::Applying);
        assert!(failure.completed.is_empty());
        assert_eq!(failure.to_string(), "Stage 'a' failed while applying: Apply failed for stage 'a': boom");
    }

    #[tokio::test]
    async fn test_output_contract_violation() {
        let stage = ScriptedStage::new("a", 10)
            .with_output_schema(
                crate::contracts::Schema::new().required("domain", crate::contracts::FieldKind::String),
            );
        let engine = ScriptedApplyEngine::new().with_outputs("a", serde_json::json!({"domain": 7}));

        let executor = PipelineExecutor::new(registry(vec![stage]), Arc::new(engine), health());
        let failure = executor.run(&PlatformConfig::new("demo")).await.unwrap_err();

        assert_eq!(failure.state, PipelineState::Applying);
        let DeployflowError::OutputContract(e) = &failure.error else {
            panic!("expected output contract error");
        };
        assert_eq!((e.path.as_str(), e.message.as_str()), ("domain", "expected string, got number"));
    }

    #[tokio::test]
    async fn test_check_failure_reports_checking_and_completed() {
        let engine = ScriptedApplyEngine::new();
        let executor = PipelineExecutor::new(
            registry(vec![
                ScriptedStage::new("a", 10),
                ScriptedStage::new("b", 20).failing_check("endpoint unreachable"),
                ScriptedStage::new("c", 30),
            ]),
            Arc::new(engine.clone()),
            health(),
        );

        let failure = executor.run(&PlatformConfig::new("demo")).await.unwrap_err();

        assert_eq!(failure.stage, "b");
        assert_eq!(failure.state, PipelineState::Checking);
        assert_eq!(failure.completed, vec!["a".to_string()]);
        assert_eq!(engine.applied(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_checks() {
        let executor = PipelineExecutor::new(
            registry(vec![ScriptedStage::new("a", 10).failing_check("down")]),
            Arc::new(ScriptedApplyEngine::new()),
            health(),
        )
        .with_options(ExecutorOptions::default().with_skip_checks(true));

        let report = executor.run(&PlatformConfig::new("demo")).await.unwrap();
        assert!(!report.stages[0].checked);
        assert_eq!(report.stages[0].state, PipelineState::Done);
    }

    #[tokio::test]
    async fn test_empty_registry_completes() {
        let executor = PipelineExecutor::new(StageRegistry::new(), Arc::new(ScriptedApplyEngine::new()), health());
        let report = executor.run(&PlatformConfig::new("demo")).await.unwrap();
        assert!(report.outputs.is_empty());
        assert!(report.stages.is_empty());
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = PipelineExecutor::new(
            registry(vec![ScriptedStage::new("a", 10)]),
            Arc::new(ScriptedApplyEngine::new()),
            health(),
        )
        .with_event_sink(sink.clone());

        executor.run(&PlatformConfig::new("demo")).await.unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.state",
                "stage.state",
                "stage.state",
                "stage.state",
                "stage.completed",
                "pipeline.completed",
            ]
        );
        let states: Vec<Value> = sink
            .events_of_type("stage.state")
            .into_iter()
            .map(|(_, data)| data.unwrap()["to"].clone())
            .collect();
        assert_eq!(states, vec!["resolving_inputs", "applying", "checking", "done"]);
    }

    #[tokio::test]
    async fn test_failure_emits_failed_transition() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut engine = MockApplyEngine::new();
        engine.expect_apply().returning(|stage, _, _| Err(ApplyError::new(stage, "denied")));
        let executor = PipelineExecutor::new(registry(vec![ScriptedStage::new("a", 10)]), Arc::new(engine), health())
            .with_event_sink(sink.clone());

        let _ = executor.run(&PlatformConfig::new("demo")).await;

        let last_state = sink.events_of_type("stage.state").last().cloned().unwrap().1.unwrap();
        assert_eq!(last_state["from"], "applying");
        assert_eq!(last_state["to"], "failed");
        let failed = sink.events_of_type("pipeline.failed");
        assert_eq!(failed.len(), 1);
        let payload = failed[0].1.clone().unwrap();
        assert_eq!(payload["error_code"], "APPLY-001-ENGINE");
        assert_eq!(payload["retryable"], false);
    }

    #[tokio::test]
    async fn test_check_only_runs_checks_for_recorded_stages() {
        let executor = PipelineExecutor::new(
            registry(vec![ScriptedStage::new("a", 10), ScriptedStage::new("b", 20).failing_check("down")]),
            Arc::new(ScriptedApplyEngine::new()),
            health(),
        );
        let mut outputs = StageOutputMap::new();
        outputs.record("a", serde_json::Map::new()).unwrap();

        assert_eq!(executor.check_only(&outputs).await.unwrap(), vec!["a".to_string()]);

        outputs.record("b", serde_json::Map::new()).unwrap();
        let failure = executor.check_only(&outputs).await.unwrap_err();
        assert_eq!(failure.stage, "b");
        assert_eq!(failure.completed, vec!["a".to_string()]);
    }
}
