//! Bulk operation engine.
//!
//! Drives one bulk action through `Validating -> Dispatching -> outcome`.
//! Validation failures are returned as `Err` before anything is sent; every
//! failure after that point comes back as an `Ok` [`BulkOperationResult`],
//! so callers handle network errors and server-reported failures the same way.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use fleet_core::{
    classify, normalize, retryable_ids, validate, BulkOperationResult, DispatchFailure,
    HttpMethod, OperationDescriptor, OperationRegistry, Outcome, ParamBag, TargetSet,
    ValidationError,
};
use http::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::client::ClientHandle;
use crate::config::{BulkConfig, ConsoleConfig};

// ---------------------------------------------------------------------------
// OperationHandler
// ---------------------------------------------------------------------------

/// Sends one bulk operation and returns the raw response body.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Dispatches `descriptor` against `targets`. Called exactly once per
    /// validated execution.
    async fn run(
        &self,
        descriptor: &OperationDescriptor,
        targets: &TargetSet,
        params: &ParamBag,
    ) -> Result<Value, DispatchFailure>;
}

/// Default handler: one JSON request to the descriptor's endpoint.
#[derive(Debug, Clone)]
pub struct RestOperation {
    client: ClientHandle,
}

impl RestOperation {
    #[must_use]
    pub fn new(client: ClientHandle) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OperationHandler for RestOperation {
    async fn run(
        &self,
        descriptor: &OperationDescriptor,
        targets: &TargetSet,
        params: &ParamBag,
    ) -> Result<Value, DispatchFailure> {
        let method = match descriptor.method {
            HttpMethod::Put => Method::PUT,
            HttpMethod::Post => Method::POST,
            HttpMethod::Delete => Method::DELETE,
        };
        let body = descriptor.request_body(targets, params);
        let response = self
            .client
            .current()
            .request(method, descriptor.endpoint, Some(body))
            .await?;
        // An empty 2xx body is an acknowledgement.
        if response.is_null() {
            return Ok(json!({ "message": format!("{} accepted", descriptor.label) }));
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// EnginePhase
// ---------------------------------------------------------------------------

/// Observable lifecycle of the most recent execution.
///
/// State machine: Idle -> Validating -> Dispatching -> (Success | PartialFailure
/// | TotalFailure), then optionally Retrying -> Dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Validating,
    Dispatching,
    Retrying,
    Success,
    PartialFailure,
    TotalFailure,
}

impl EnginePhase {
    /// Whether this phase ends an execution.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::PartialFailure | Self::TotalFailure
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Dispatching => "dispatching",
            Self::Retrying => "retrying",
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::TotalFailure => "total_failure",
        }
    }
}

impl From<Outcome> for EnginePhase {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::PartialFailure => Self::PartialFailure,
            Outcome::TotalFailure => Self::TotalFailure,
        }
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BulkOperationEngine
// ---------------------------------------------------------------------------

/// Validates, dispatches and normalizes bulk operations.
///
/// Holds no per-call state besides the published phase, so concurrent
/// `execute` calls are independent. Results are never cached.
pub struct BulkOperationEngine {
    registry: OperationRegistry,
    default_handler: Arc<dyn OperationHandler>,
    handlers: HashMap<&'static str, Arc<dyn OperationHandler>>,
    config: BulkConfig,
    phase: watch::Sender<EnginePhase>,
}

impl BulkOperationEngine {
    /// Creates an engine that dispatches every operation over `client`.
    #[must_use]
    pub fn new(registry: OperationRegistry, client: ClientHandle, config: BulkConfig) -> Self {
        Self::from_handler(registry, Arc::new(RestOperation::new(client)), config)
    }

    /// Creates an engine over the built-in registry using `config.bulk`.
    #[must_use]
    pub fn from_config(client: ClientHandle, config: &ConsoleConfig) -> Self {
        Self::new(OperationRegistry::builtin(), client, config.bulk.clone())
    }

    /// Creates an engine with a single handler for every operation.
    #[must_use]
    pub fn from_handler(
        registry: OperationRegistry,
        handler: Arc<dyn OperationHandler>,
        config: BulkConfig,
    ) -> Self {
        let (phase, _rx) = watch::channel(EnginePhase::Idle);
        Self {
            registry,
            default_handler: handler,
            handlers: HashMap::new(),
            config,
            phase,
        }
    }

    /// Overrides the handler of one registered operation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownOperation` if `operation_id` is not registered.
    pub fn with_handler(
        mut self,
        operation_id: &str,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<Self, ValidationError> {
        let id = self.registry.require(operation_id)?.id;
        self.handlers.insert(id, handler);
        Ok(self)
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EnginePhase> {
        self.phase.subscribe()
    }

    /// Runs `operation_id` against `target_ids`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` (and makes no network call) if the
    /// operation is unknown, the target ids are invalid, or the parameters do
    /// not satisfy the operation's contract. Execution failures are returned
    /// as `Ok` results with `success_count == 0`.
    pub async fn execute(
        &self,
        operation_id: &str,
        target_ids: &[i64],
        params: Option<ParamBag>,
    ) -> Result<BulkOperationResult, ValidationError> {
        let descriptor = self.registry.require(operation_id)?;
        let params = params.unwrap_or_default();

        self.set_phase(EnginePhase::Validating);
        let targets = match self.prepare(descriptor, target_ids, &params) {
            Ok(targets) => targets,
            Err(err) => {
                tracing::warn!(operation = descriptor.id, error = %err, "bulk operation rejected");
                self.set_phase(EnginePhase::Idle);
                return Err(err);
            }
        };

        Ok(self.dispatch(descriptor, &targets, &params).await)
    }

    /// Re-dispatches `operation_id` against the retryable ids of `previous`.
    ///
    /// Parameters are re-validated but no `Validating` phase is published.
    ///
    /// # Errors
    ///
    /// - `ValidationError::UnknownOperation` if the operation is not registered
    /// - `ValidationError::NothingToRetry` if `previous` has no item-level failures
    /// - any parameter validation error
    pub async fn retry_failed(
        &self,
        operation_id: &str,
        previous: &BulkOperationResult,
        params: Option<ParamBag>,
    ) -> Result<BulkOperationResult, ValidationError> {
        let descriptor = self.registry.require(operation_id)?;
        let ids = retryable_ids(previous);
        if ids.is_empty() {
            return Err(ValidationError::NothingToRetry);
        }
        let params = params.unwrap_or_default();
        validate(&params, descriptor.required_parameters)?;
        let targets = TargetSet::from_domain_ids(ids, self.config.max_targets)?;

        self.set_phase(EnginePhase::Retrying);
        tracing::info!(
            operation = descriptor.id,
            targets = targets.len(),
            "retrying failed items"
        );
        Ok(self.dispatch(descriptor, &targets, &params).await)
    }

    fn prepare(
        &self,
        descriptor: &OperationDescriptor,
        target_ids: &[i64],
        params: &ParamBag,
    ) -> Result<TargetSet, ValidationError> {
        let targets = TargetSet::new(target_ids.iter().copied(), self.config.max_targets)?;
        validate(params, descriptor.required_parameters)?;
        Ok(targets)
    }

    async fn dispatch(
        &self,
        descriptor: &OperationDescriptor,
        targets: &TargetSet,
        params: &ParamBag,
    ) -> BulkOperationResult {
        self.set_phase(EnginePhase::Dispatching);
        tracing::info!(
            operation = descriptor.id,
            targets = targets.len(),
            "dispatching bulk operation"
        );

        let handler = self
            .handlers
            .get(descriptor.id)
            .unwrap_or(&self.default_handler);
        let result = match handler
            .run(descriptor, targets, params)
            .await
            .and_then(|raw| normalize(&raw, targets.len()).map_err(DispatchFailure::from))
        {
            Ok(result) => result,
            Err(failure) => {
                let classified = classify(&failure);
                tracing::warn!(
                    operation = descriptor.id,
                    kind = %classified.kind,
                    status = ?classified.status,
                    error = %classified.message,
                    "bulk operation failed"
                );
                classified.into_result(descriptor.label, targets.len())
            }
        };

        let outcome = Outcome::of(&result);
        self.set_phase(outcome.into());
        metrics::counter!(
            "fleet_bulk_operations_total",
            "operation" => descriptor.id,
            "outcome" => outcome.as_str()
        )
        .increment(1);
        tracing::info!(
            operation = descriptor.id,
            outcome = outcome.as_str(),
            succeeded = result.success_count(),
            failed = result.failed_count(),
            "bulk operation complete"
        );
        result
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.send_replace(phase);
    }
}

impl fmt::Debug for BulkOperationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkOperationEngine")
            .field("operations", &self.registry.list().len())
            .field("overrides", &self.handlers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
