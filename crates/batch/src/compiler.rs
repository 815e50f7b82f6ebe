//! Batch compiler
//!
//! Turns the ordered intents of one transaction into the fewest remote
//! calls the endpoint allows. Order is never changed: intents are
//! translated one to one and cut into consecutive chunks of at most
//! `max_requests_per_call` requests.
//!
//! The compiler also decides whether the transaction as a whole is
//! high-risk, which obliges the manager to hold a snapshot before the
//! first call goes out.

use crate::translate::translate;
use gridtxn_core::{
    Error, Intent, IntentId, RemoteRequest, RequestKind, ResourceId, Result,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

/// Default per-call request limit
pub const DEFAULT_MAX_REQUESTS_PER_CALL: usize = 100;

/// Default aggregate cell count above which a plan is high-risk
pub const DEFAULT_HIGH_RISK_CELL_THRESHOLD: u64 = 10_000;

/// Requests for one remote call, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    /// Request objects
    pub requests: Vec<RemoteRequest>,
    /// Kind of each request, parallel to `requests`
    pub kinds: Vec<RequestKind>,
    /// Intent each request came from, parallel to `requests`
    pub intent_ids: Vec<IntentId>,
}

impl CallPayload {
    fn with_capacity(n: usize) -> Self {
        Self {
            requests: Vec::with_capacity(n),
            kinds: Vec::with_capacity(n),
            intent_ids: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, intent_id: IntentId, request: RemoteRequest) {
        self.kinds.push(request.kind());
        self.intent_ids.push(intent_id);
        self.requests.push(request);
    }

    /// Number of requests
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when the payload holds no requests
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Request body for the batch endpoint: `{"requests": [...]}`
    pub fn to_json(&self) -> Value {
        let requests: Vec<Value> = self.requests.iter().map(RemoteRequest::to_json).collect();
        json!({ "requests": requests })
    }
}

/// Output of one compilation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPlan {
    /// Resource every payload applies to
    pub resource_id: ResourceId,
    /// Calls to issue, in order
    pub payloads: Vec<CallPayload>,
    /// Intents compiled
    pub intent_count: usize,
    /// Sum of the intents' estimated cells
    pub estimated_cells: u64,
    /// Snapshot required before execution
    pub high_risk: bool,
    /// Why the plan is high-risk
    pub high_risk_reasons: Vec<String>,
}

impl CompiledPlan {
    /// Plan with no calls
    pub fn empty(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            payloads: Vec::new(),
            intent_count: 0,
            estimated_cells: 0,
            high_risk: false,
            high_risk_reasons: Vec::new(),
        }
    }

    /// No calls to make
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Number of remote calls
    pub fn call_count(&self) -> usize {
        self.payloads.len()
    }

    /// Total requests across all calls
    pub fn request_count(&self) -> usize {
        self.payloads.iter().map(CallPayload::len).sum()
    }
}

/// Compiles intents into call payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCompiler {
    max_requests_per_call: usize,
    high_risk_cell_threshold: u64,
}

impl Default for BatchCompiler {
    fn default() -> Self {
        Self {
            max_requests_per_call: DEFAULT_MAX_REQUESTS_PER_CALL,
            high_risk_cell_threshold: DEFAULT_HIGH_RISK_CELL_THRESHOLD,
        }
    }
}

impl BatchCompiler {
    /// Compiler with explicit limits
    ///
    /// # Errors
    /// `InvalidInput` if `max_requests_per_call` is zero.
    pub fn new(max_requests_per_call: usize, high_risk_cell_threshold: u64) -> Result<Self> {
        if max_requests_per_call == 0 {
            return Err(Error::invalid_input("max_requests_per_call must be at least 1"));
        }
        Ok(Self {
            max_requests_per_call,
            high_risk_cell_threshold,
        })
    }

    /// Per-call request limit
    pub fn max_requests_per_call(&self) -> usize {
        self.max_requests_per_call
    }

    /// Aggregate cell threshold
    pub fn high_risk_cell_threshold(&self) -> u64 {
        self.high_risk_cell_threshold
    }

    /// Compile `intents` for `resource_id`
    ///
    /// An empty list compiles to an empty plan.
    ///
    /// # Errors
    /// - `InvalidIntent` if an intent targets a different resource
    /// - any validation error from translating an intent
    pub fn compile(&self, resource_id: &ResourceId, intents: &[Intent]) -> Result<CompiledPlan> {
        let mut plan = CompiledPlan::empty(resource_id.clone());
        if intents.is_empty() {
            return Ok(plan);
        }

        let mut current = CallPayload::with_capacity(self.max_requests_per_call.min(intents.len()));
        for intent in intents {
            if intent.resource_id() != resource_id {
                return Err(Error::InvalidIntent {
                    reason: format!(
                        "intent {} targets {} but the batch is for {}",
                        intent.id(),
                        intent.resource_id(),
                        resource_id
                    ),
                });
            }

            let request = translate(intent)?;
            if current.len() == self.max_requests_per_call {
                let remaining = self.max_requests_per_call.min(intents.len() - plan.intent_count);
                let full = std::mem::replace(&mut current, CallPayload::with_capacity(remaining));
                plan.payloads.push(full);
            }
            current.push(intent.id(), request);
            plan.intent_count += 1;

            plan.estimated_cells = plan
                .estimated_cells
                .saturating_add(intent.estimated_cells().unwrap_or(0));
            if intent.is_high_risk() {
                plan.high_risk_reasons
                    .push(format!("{} is a high-risk operation", intent.intent_type()));
            }
        }
        plan.payloads.push(current);

        if plan.estimated_cells > self.high_risk_cell_threshold {
            plan.high_risk_reasons.push(format!(
                "estimated {} cells exceeds threshold {}",
                plan.estimated_cells, self.high_risk_cell_threshold
            ));
        }
        plan.high_risk = !plan.high_risk_reasons.is_empty();

        debug!(
            target: "gridtxn::txn",
            resource = %resource_id,
            intents = plan.intent_count,
            calls = plan.call_count(),
            cells = plan.estimated_cells,
            high_risk = plan.high_risk,
            "compiled batch plan"
        );
        Ok(plan)
    }
}
