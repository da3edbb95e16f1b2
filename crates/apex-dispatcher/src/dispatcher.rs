use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use apex_hooks::{HookContext, HookPayload, HookPhase, Pipeline, PipelineOutcome};
use apex_ledger::Ledger;
use apex_types::{AgentId, RequestId};

use crate::error::DispatcherError;
use crate::framing::{FrameEvent, FrameReader, FramingConfig};
use crate::methods;
use crate::registry::RequestRegistry;
use crate::sandbox::ToolSandbox;
use crate::wire::{WireError, WireNotification, WireResponse};

/// Wiring and timing knobs for one [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub framing: FramingConfig,
    pub request_ttl: Duration,
    pub sweep_interval: Duration,
    pub retention: Duration,
    pub token_tax_rate: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            framing: FramingConfig::default(),
            request_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            retention: Duration::from_secs(30),
            token_tax_rate: 0.01,
        }
    }
}

/// Methods that run the tool pipeline; everything else is a direct ledger
/// or registry read, so it skips PRE_TOOL/POST_TOOL entirely.
const TOOLS_CALL_METHOD: &str = "tools/call";
const CANCEL_METHOD: &str = "$/cancelRequest";

/// Ties the framed byte stream, hook pipeline, request registry, and
/// built-in method handlers together into one serviceable connection
/// handler.
pub struct Dispatcher {
    ledger: Arc<Ledger>,
    pipeline: Arc<Pipeline>,
    registry: Arc<RequestRegistry>,
    sandbox: Arc<dyn ToolSandbox>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<Ledger>,
        pipeline: Arc<Pipeline>,
        sandbox: Arc<dyn ToolSandbox>,
        config: DispatcherConfig,
    ) -> Self {
        Dispatcher {
            ledger,
            pipeline,
            registry: Arc::new(RequestRegistry::new()),
            sandbox,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Drives one connection to completion: reads NDJSON frames until EOF,
    /// dispatching each concurrently and writing responses back in whatever
    /// order they complete. A background sweeper times out stale requests
    /// and evicts retained completed ones for the lifetime of the call.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), DispatcherError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        let (tx, mut rx) = mpsc::channel::<String>(256);

        let registry = self.registry.clone();
        let ttl = self.config.request_ttl;
        let sweep_interval = self.config.sweep_interval;
        let retention = self.config.retention;
        let sweeper_tx = tx.clone();
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                let timed_out = registry.sweep_timeouts(ttl).await;
                for (request_id, cancel) in timed_out {
                    cancel.notify_waiters();
                    let response = WireResponse::failure(
                        Some(request_id),
                        WireError {
                            code: DispatcherError::TimedOut.code(),
                            message: DispatcherError::TimedOut.to_string(),
                            data: None,
                        },
                    );
                    if let Ok(line) = serde_json::to_string(&response) {
                        let _ = sweeper_tx.send(line).await;
                    }
                }
                registry.evict_stale(retention).await;
            }
        });

        let mut frames = FrameReader::new(reader, self.config.framing);
        let mut in_flight = Vec::new();
        loop {
            match frames.next_frame().await {
                Ok(FrameEvent::Eof) => break,
                Ok(FrameEvent::Backpressure) => {
                    let notification = WireNotification::new("server/busy", None);
                    if let Ok(line) = serde_json::to_string(&notification) {
                        let _ = tx.send(line).await;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(FrameEvent::Message(request)) => {
                    if request.method == CANCEL_METHOD {
                        self.handle_cancel(&request.params).await;
                        continue;
                    }
                    let handle = tokio::spawn(self.clone_for_task().handle_request(
                        request.id,
                        request.method,
                        request.params,
                        tx.clone(),
                    ));
                    in_flight.push(handle);
                }
                Err(err) => {
                    warn!(error = %err, "framing error, closing connection");
                    let response = WireResponse::failure(
                        None,
                        WireError {
                            code: err.code(),
                            message: err.to_string(),
                            data: None,
                        },
                    );
                    if let Ok(line) = serde_json::to_string(&response) {
                        let _ = tx.send(line).await;
                    }
                    break;
                }
            }
        }

        for handle in in_flight {
            let _ = handle.await;
        }
        drop(tx);
        sweeper.abort();

        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.write_all(b"\n").await.is_err() {
                break;
            }
        }
        let _ = writer.flush().await;
        Ok(())
    }

    /// A cheap, `Arc`-backed clone of just the fields a spawned request
    /// handler needs, so `serve` doesn't have to wrap the whole struct in
    /// an `Arc` just to move pieces into a task.
    fn clone_for_task(&self) -> Dispatcher {
        Dispatcher {
            ledger: self.ledger.clone(),
            pipeline: self.pipeline.clone(),
            registry: self.registry.clone(),
            sandbox: self.sandbox.clone(),
            config: self.config.clone(),
        }
    }

    async fn handle_cancel(&self, params: &serde_json::Value) {
        #[derive(serde::Deserialize)]
        struct CancelParams {
            request_id: RequestId,
        }
        match serde_json::from_value::<CancelParams>(params.clone()) {
            Ok(parsed) => {
                let cancelled = self.registry.cancel(&parsed.request_id).await;
                info!(request_id = %parsed.request_id, cancelled, "processed cancel request");
            }
            Err(err) => warn!(error = %err, "malformed $/cancelRequest notification"),
        }
    }

    async fn handle_request(
        self,
        id: Option<RequestId>,
        method: String,
        params: serde_json::Value,
        tx: mpsc::Sender<String>,
    ) {
        let request_id = match &id {
            Some(id) => id.clone(),
            // Requests with no id are notifications, which reserve a null
            // id; give this one a throwaway internal identity purely for
            // registry bookkeeping.
            None => RequestId::Str(uuid::Uuid::new_v4().to_string()),
        };

        let agent_id = params
            .get("agent_id")
            .and_then(|v| v.as_str())
            .and_then(|s| AgentId::new(s.to_string()));

        let cancel = self
            .registry
            .register(request_id.clone(), method.clone(), &params, agent_id.clone())
            .await;

        let result = tokio::select! {
            result = self.dispatch(request_id.clone(), &method, params, agent_id) => result,
            _ = cancel.notified() => {
                return;
            }
        };

        match result {
            Ok(value) => {
                self.registry
                    .mark(&request_id, crate::registry::RequestStatus::Completed)
                    .await;
                if id.is_some() {
                    let response = WireResponse::success(id, value);
                    if let Ok(line) = serde_json::to_string(&response) {
                        let _ = tx.send(line).await;
                    }
                }
            }
            Err(err) => {
                self.registry
                    .mark(&request_id, crate::registry::RequestStatus::Failed)
                    .await;
                if id.is_some() {
                    let response = WireResponse::failure(
                        id,
                        WireError {
                            code: err.code(),
                            message: err.to_string(),
                            data: None,
                        },
                    );
                    if let Ok(line) = serde_json::to_string(&response) {
                        let _ = tx.send(line).await;
                    }
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request_id: RequestId,
        method: &str,
        params: serde_json::Value,
        agent_id: Option<AgentId>,
    ) -> Result<serde_json::Value, DispatcherError> {
        match method {
            "ledger/getAgent" => methods::ledger_get_agent(&self.ledger, &params).await,
            "ledger/transfer" => methods::ledger_transfer(&self.ledger, &params).await,
            "ledger/snapshot" => methods::ledger_snapshot(&self.ledger).await,
            "registry/listActive" => methods::registry_list_active(&self.registry).await,
            TOOLS_CALL_METHOD => self.dispatch_tool_call(request_id, params, agent_id).await,
            other => Err(DispatcherError::MethodNotFound(other.to_string())),
        }
    }

    async fn dispatch_tool_call(
        &self,
        request_id: RequestId,
        params: serde_json::Value,
        agent_id: Option<AgentId>,
    ) -> Result<serde_json::Value, DispatcherError> {
        let ctx = HookContext::new(self.ledger.clone(), self.config.token_tax_rate);

        let mut payload = HookPayload::new(request_id, TOOLS_CALL_METHOD, params);
        payload.agent_id = agent_id;

        let payload = match self.pipeline.run(HookPhase::PreTool, payload, &ctx).await {
            PipelineOutcome::Continue(payload) => payload,
            PipelineOutcome::Halt(payload) => return Err(self.halt_error(&payload)),
        };

        let call = methods::parse_tool_call(&payload.params)?;
        let start = std::time::Instant::now();
        let (tool_result, cost) = methods::tools_call(
            &self.ledger,
            &self.sandbox,
            &call,
            self.config.token_tax_rate,
        )
        .await?;
        let execution_time = start.elapsed();

        let mut payload = payload;
        payload.tool_ran = true;
        payload.result = Some(tool_result.clone());
        payload.computed_cost = Some(cost);

        let payload = match self.pipeline.run(HookPhase::PostTool, payload, &ctx).await {
            PipelineOutcome::Continue(payload) => payload,
            PipelineOutcome::Halt(payload) => return Err(self.halt_error(&payload)),
        };

        let sanitized = payload.result.unwrap_or(tool_result);
        Ok(serde_json::json!({
            "result": sanitized,
            "execution_time_ms": execution_time.as_millis() as u64,
            "cost": cost,
        }))
    }

    fn halt_error(&self, payload: &HookPayload) -> DispatcherError {
        payload
            .violations
            .last()
            .map(|v| DispatcherError::from(v.kind))
            .unwrap_or_else(|| DispatcherError::Internal("hook pipeline halted without a violation".into()))
    }
}
