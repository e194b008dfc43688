//! Bounds that keep inference finite.

/// Number of times a `for` body is re-analyzed.
///
/// Two passes are a bounded approximation of the loop fixpoint: a variable
/// whose type changes across iterations reaches the join of its pre-loop and
/// in-loop types after the first merge, and the second pass confirms it.
/// Tests exercising convergence raise it through `InferenceConfig::loop_passes`.
pub const DEFAULT_LOOP_PASSES: usize = 2;

/// Default bound on nested inlining; `None` follows the call graph as deep as
/// the analyzed program goes.
pub const DEFAULT_MAX_INLINE_DEPTH: Option<usize> = None;
