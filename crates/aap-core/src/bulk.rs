//! The bulk transactional executor.
//!
//! Every endpoint runs its sub-requests through [`BulkExecutor::execute`]:
//!
//!   Limits → Validate → Begin → Handler (in order, fail-fast) → Commit | Rollback
//!
//! The invariant is absolute: either every item's graph effects are committed
//! together, or none are. A single failing item aborts the whole batch. The
//! failing item keeps its specific error code while every other item reports
//! `FAILED_DUE_TO_OTHER_ERRORS`.
//!
//! Result slots are pre-populated with a pending sentinel. A handler that
//! returns without resolving every slot is treated as an internal failure,
//! so a forgotten item can never be silently committed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use aap_contracts::{
    bulk::{ApiError, BulkResponse},
    error::{AapError, AapResult},
    graph::TxMode,
};

use crate::traits::{GraphStore, GraphTransaction, Validate};

/// Per-endpoint bounds on batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_requests: usize,
    /// Accept an empty batch (answered with an empty response) instead of
    /// rejecting it with `EmptyRequestNotAllowed`.
    pub allow_empty: bool,
}

impl BatchLimits {
    pub fn new(max_requests: usize) -> Self {
        Self {
            max_requests,
            allow_empty: false,
        }
    }

    /// A batch of exactly one item, for endpoints that drive an external,
    /// non-transactional system.
    pub fn single() -> Self {
        Self::new(1)
    }

    pub fn allowing_empty(self) -> Self {
        Self {
            allow_empty: true,
            ..self
        }
    }

    /// Check `count` against these limits.
    pub fn check(&self, count: usize) -> AapResult<()> {
        if count == 0 && !self.allow_empty {
            return Err(AapError::EmptyRequestNotAllowed);
        }
        if count > self.max_requests {
            return Err(AapError::MaxRequestsExceeded {
                max: self.max_requests,
                got: count,
            });
        }
        Ok(())
    }
}

/// One sub-request as seen by a handler.
#[derive(Debug, Clone)]
pub struct BulkRequest<I> {
    pub index: usize,
    pub input: I,
}

#[derive(Debug)]
enum Slot<O> {
    Pending,
    Done(BulkResponse<O>),
}

/// The ordered batch a handler works through.
///
/// Handlers either call [`Batch::process`] with a per-item closure, or drive
/// the batch by hand with [`Batch::succeed`] / [`Batch::fail`].
#[derive(Debug)]
pub struct Batch<I, O> {
    requests: Vec<BulkRequest<I>>,
    slots: Vec<Slot<O>>,
    aborted: bool,
}

impl<I, O> Batch<I, O> {
    fn new(inputs: Vec<I>) -> Self {
        let slots = inputs.iter().map(|_| Slot::Pending).collect();
        let requests = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| BulkRequest { index, input })
            .collect();
        Self {
            requests,
            slots,
            aborted: false,
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn requests(&self) -> &[BulkRequest<I>] {
        &self.requests
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Record a successful output for `index`.
    ///
    /// Ignored once the batch is aborted: nothing after the abort may report
    /// success.
    pub fn succeed(&mut self, index: usize, status: u16, output: O) {
        if self.aborted {
            debug!(index, "ignoring success recorded after abort");
            return;
        }
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Slot::Done(BulkResponse::success(index, status, output));
        }
    }

    /// Abort the batch because of `err` at `index`.
    ///
    /// Every slot is stamped with the uniform abort error, then the
    /// triggering slot is overwritten with its specific error.
    pub fn fail(&mut self, index: usize, err: &AapError) {
        warn!(index, code = err.code().as_str(), error = %err, "bulk item failed, aborting batch");
        self.abort_all();
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Slot::Done(BulkResponse::failure(index, err.status(), ApiError::from(err)));
        }
    }

    /// Abort the whole batch with one batch-level `err`, stamped on every
    /// slot. Used when the batch fails as a unit (e.g. the caller is not
    /// authorized for the endpoint).
    pub fn reject(&mut self, err: &AapError) {
        warn!(code = err.code().as_str(), error = %err, "bulk batch rejected");
        self.aborted = true;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot::Done(BulkResponse::failure(index, err.status(), ApiError::from(err)));
        }
    }

    fn abort_all(&mut self) {
        self.aborted = true;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot::Done(BulkResponse::failure(index, 400, ApiError::aborted()));
        }
    }

    fn fail_internal(&mut self) {
        self.aborted = true;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot::Done(BulkResponse::failure(index, 500, ApiError::internal()));
        }
    }

    /// Run `f` on each request in input order, stopping at the first error.
    pub fn process<F>(&mut self, tx: &mut dyn GraphTransaction, mut f: F)
    where
        F: FnMut(&mut dyn GraphTransaction, &I) -> AapResult<(u16, O)>,
    {
        for index in 0..self.requests.len() {
            if self.aborted {
                break;
            }
            let result = f(&mut *tx, &self.requests[index].input);
            match result {
                Ok((status, output)) => self.succeed(index, status, output),
                Err(err) => {
                    self.fail(index, &err);
                    break;
                }
            }
        }
    }

    fn has_pending(&self) -> bool {
        self.slots.iter().any(|s| matches!(s, Slot::Pending))
    }

    fn into_responses(self) -> Vec<BulkResponse<O>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Done(response) => response,
                Slot::Pending => BulkResponse::failure(index, 500, ApiError::internal()),
            })
            .collect()
    }
}

/// The result of one bulk execution.
#[derive(Debug)]
pub struct BulkOutcome<O> {
    /// True only if the transaction committed.
    pub committed: bool,
    /// One response per input, in input order.
    pub responses: Vec<BulkResponse<O>>,
}

/// Runs batches of sub-requests in a single graph transaction.
///
/// Holds the shared graph store handle; construct once and share across
/// request threads.
#[derive(Clone)]
pub struct BulkExecutor {
    store: Arc<dyn GraphStore>,
}

impl BulkExecutor {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Execute `inputs` as one all-or-nothing batch.
    ///
    /// # Pipeline
    ///
    /// 1. Check the batch against `limits`; violations are returned as `Err`
    ///    before anything else happens.
    /// 2. Validate every input; invalid items are reported as
    ///    `INPUT_VALIDATION_FAILED`, the rest as aborted, and no transaction
    ///    is opened.
    /// 3. Open one transaction in `mode` (a failure here is returned as `Err`).
    /// 4. Call `handler` once with the whole ordered batch.
    /// 5. Commit iff nothing aborted and no slot is pending; roll back otherwise.
    ///
    /// # Errors
    ///
    /// Only batch-level rejections (`EmptyRequestNotAllowed`,
    /// `MaxRequestsExceeded`) and a failure to open the transaction are
    /// returned as `Err`. Every other failure is reported per item.
    pub fn execute<I, O, F>(
        &self,
        mode: TxMode,
        limits: BatchLimits,
        inputs: Vec<I>,
        handler: F,
    ) -> AapResult<BulkOutcome<O>>
    where
        I: Validate,
        F: FnOnce(&mut dyn GraphTransaction, &mut Batch<I, O>) -> AapResult<()>,
    {
        limits.check(inputs.len())?;

        let mut batch = Batch::new(inputs);

        // ── Validation gate: no transaction for malformed input ──────────────
        let invalid: Vec<(usize, AapError)> = batch
            .requests
            .iter()
            .filter_map(|r| r.input.validate().err().map(|e| (r.index, e)))
            .collect();
        if !invalid.is_empty() {
            warn!(invalid = invalid.len(), total = batch.len(), "rejecting batch with invalid input");
            batch.abort_all();
            for (index, err) in &invalid {
                batch.slots[*index] =
                    Slot::Done(BulkResponse::failure(*index, err.status(), ApiError::from(err)));
            }
            return Ok(BulkOutcome {
                committed: false,
                responses: batch.into_responses(),
            });
        }

        // ── One transaction for the whole batch ──────────────────────────────
        let mut tx = self.store.begin(mode)?;
        debug!(?mode, items = batch.len(), "bulk transaction opened");

        if let Err(err) = handler(tx.as_mut(), &mut batch) {
            warn!(error = %err, "bulk handler failed, rolling back");
            batch.fail_internal();
        }

        if batch.aborted || batch.has_pending() {
            if !batch.aborted {
                warn!("bulk handler left requests unprocessed, rolling back");
                batch.fail_internal();
            }
            if let Err(err) = tx.rollback() {
                warn!(error = %err, "rollback failed");
            }
            return Ok(BulkOutcome {
                committed: false,
                responses: batch.into_responses(),
            });
        }

        match tx.commit() {
            Ok(()) => {
                info!(?mode, items = batch.len(), "bulk transaction committed");
                Ok(BulkOutcome {
                    committed: true,
                    responses: batch.into_responses(),
                })
            }
            Err(err) => {
                warn!(error = %err, "bulk commit failed");
                batch.fail_internal();
                Ok(BulkOutcome {
                    committed: false,
                    responses: batch.into_responses(),
                })
            }
        }
    }
}
