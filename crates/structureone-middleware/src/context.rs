//! State carried through one pipeline run.

use crate::limiter::RateDecision;
use crate::pipeline::Stage;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use structureone_core::{Claims, RequestId};

/// Mutable state shared by the stages of one pipeline run.
///
/// The caller owns the context, so the rate decision is still readable after
/// a stage has failed and the headers can go on the error response.
#[derive(Debug)]
pub struct MiddlewareContext {
    request_id: RequestId,
    user: Option<Claims>,
    data: Map<String, Value>,
    rate: Option<RateDecision>,
    stages_run: Vec<Stage>,
    started_at: Instant,
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context for an existing request.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            user: None,
            data: Map::new(),
            rate: None,
            stages_run: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// The request's ID.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Claims of the authenticated caller.
    pub fn user(&self) -> Option<&Claims> {
        self.user.as_ref()
    }

    /// Binds the authenticated caller.
    pub fn set_user(&mut self, claims: Claims) {
        self.user = Some(claims);
    }

    /// Body data collected so far.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Body data for modification.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Replaces the body data.
    pub fn set_data(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    /// Outcome of the rate stage, if it ran.
    pub fn rate(&self) -> Option<&RateDecision> {
        self.rate.as_ref()
    }

    /// Records the rate stage outcome.
    pub fn set_rate(&mut self, decision: RateDecision) {
        self.rate = Some(decision);
    }

    /// Stages entered, in order.
    pub fn stages_run(&self) -> &[Stage] {
        &self.stages_run
    }

    pub(crate) fn record_stage(&mut self, stage: Stage) {
        self.stages_run.push(stage);
    }

    /// Time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
