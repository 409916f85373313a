//! Cumulative counter reconciliation
//!
//! Some agents (Codex CLI in particular) do not log the usage of each request.
//! They log the running total for the whole session instead. This module turns
//! consecutive readings of such a counter into per-event deltas.
//!
//! A reading that goes *down* in any field means the process restarted and
//! its counters started over. In that case the whole new reading is the
//! delta. Clamping each field to zero would silently drop the usage the
//! restarted process has already done.
//!
//! [`reconcile`] is a pure function. [`StreamReconciler`] is the small store
//! that loaders thread through a file to remember the previous reading of
//! every stream.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::types::TokenCounts;

/// One cumulative reading, in Codex's field layout
///
/// `cached_input_tokens` is a subset of `input_tokens`, and
/// `reasoning_output_tokens` is a subset of `output_tokens`. The reported
/// `total_tokens` is kept only for diagnostics; it is never trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl RawSnapshot {
    pub fn new(input: u64, cached_input: u64, output: u64, reasoning_output: u64) -> Self {
        Self {
            input_tokens: input,
            cached_input_tokens: cached_input,
            output_tokens: output,
            reasoning_output_tokens: reasoning_output,
            total_tokens: None,
        }
    }
}

/// Incremental usage attributed to one reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_output_tokens: u64,
}

impl UsageDelta {
    fn from_snapshot(s: &RawSnapshot) -> Self {
        Self {
            input_tokens: s.input_tokens,
            cached_input_tokens: s.cached_input_tokens,
            output_tokens: s.output_tokens,
            reasoning_output_tokens: s.reasoning_output_tokens,
        }
    }

    /// Sum of parts: cached input sits inside input, reasoning inside output
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Split into the workspace-wide token layout
    ///
    /// Non-cached input becomes `input_tokens` and cached input becomes
    /// `cache_read_tokens`, so `TokenCounts::total` equals
    /// [`UsageDelta::total_tokens`] for well-formed readings. If a reading
    /// claims more cached than total input, the non-cached part is 0.
    pub fn to_token_counts(&self) -> TokenCounts {
        TokenCounts::new(
            self.input_tokens.saturating_sub(self.cached_input_tokens),
            self.output_tokens,
            0,
            self.cached_input_tokens,
        )
        .with_reasoning(self.reasoning_output_tokens)
    }
}

impl From<&RawSnapshot> for UsageDelta {
    fn from(snapshot: &RawSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

/// Outcome of one reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Field-wise difference from the previous reading, or the first reading
    Delta(UsageDelta),
    /// A counter went backwards; the current reading is taken as a new baseline
    Reset(UsageDelta),
}

impl Reconciled {
    pub fn usage(&self) -> UsageDelta {
        match self {
            Self::Delta(d) | Self::Reset(d) => *d,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset(_))
    }
}

/// Compute the usage attributable to `current`
///
/// # Examples
/// ```
/// use agstat_core::reconcile::{reconcile, RawSnapshot, Reconciled};
///
/// let prev = RawSnapshot::new(100, 0, 50, 0);
/// let cur = RawSnapshot::new(20, 0, 10, 0);
/// let out = reconcile(&cur, Some(&prev));
/// assert!(out.is_reset());
/// assert_eq!(out.usage().input_tokens, 20);
/// assert_eq!(out.usage().output_tokens, 10);
/// ```
pub fn reconcile(current: &RawSnapshot, previous: Option<&RawSnapshot>) -> Reconciled {
    let Some(prev) = previous else {
        return Reconciled::Delta(UsageDelta::from_snapshot(current));
    };

    let diff = checked_diff(current, prev);

    match diff {
        Some(delta) => Reconciled::Delta(delta),
        None => Reconciled::Reset(UsageDelta::from_snapshot(current)),
    }
}

fn checked_diff(current: &RawSnapshot, prev: &RawSnapshot) -> Option<UsageDelta> {
    Some(UsageDelta {
        input_tokens: current.input_tokens.checked_sub(prev.input_tokens)?,
        cached_input_tokens: current
            .cached_input_tokens
            .checked_sub(prev.cached_input_tokens)?,
        output_tokens: current.output_tokens.checked_sub(prev.output_tokens)?,
        reasoning_output_tokens: current
            .reasoning_output_tokens
            .checked_sub(prev.reasoning_output_tokens)?,
    })
}

/// Last reading per stream key
///
/// # Examples
/// ```
/// use agstat_core::reconcile::{RawSnapshot, StreamReconciler};
///
/// let mut streams = StreamReconciler::new();
/// streams.observe("a", RawSnapshot::new(10, 0, 5, 0));
/// let step = streams.observe("a", RawSnapshot::new(25, 0, 9, 0));
/// assert_eq!(step.usage().total_tokens(), 19);
/// ```
#[derive(Debug, Clone)]
pub struct StreamReconciler<K> {
    last: HashMap<K, RawSnapshot>,
    resets: usize,
}

impl<K: Eq + Hash> Default for StreamReconciler<K> {
    fn default() -> Self {
        Self {
            last: HashMap::new(),
            resets: 0,
        }
    }
}

impl<K: Eq + Hash> StreamReconciler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile `snapshot` against the stream's previous reading and
    /// remember it, reset or not, as the new previous
    pub fn observe(&mut self, key: K, snapshot: RawSnapshot) -> Reconciled {
        let outcome = reconcile(&snapshot, self.last.get(&key));
        if outcome.is_reset() {
            self.resets += 1;
        }
        self.last.insert(key, snapshot);
        outcome
    }

    pub fn previous<Q>(&self, key: &Q) -> Option<&RawSnapshot>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.last.get(key)
    }

    pub fn forget<Q>(&mut self, key: &Q) -> Option<RawSnapshot>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.last.remove(key)
    }

    /// Put a stream back to a reading taken earlier with [`previous`],
    /// or drop it when there was none
    ///
    /// [`previous`]: StreamReconciler::previous
    pub fn restore(&mut self, key: K, checkpoint: Option<RawSnapshot>) {
        match checkpoint {
            Some(snapshot) => {
                self.last.insert(key, snapshot);
            }
            None => {
                self.last.remove(&key);
            }
        }
    }

    /// Number of resets seen since construction
    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
