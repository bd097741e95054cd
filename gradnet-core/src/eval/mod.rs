//! The four graph passes: evaluate, accumulate gradients, adjust weights,
//! commit weights.
//!
//! Passes are methods on [`Graph`](crate::graph::Graph) and lean on the
//! per-node status trackers for memoization: a pass touches a node only when
//! the work it records is out of date for that node.

mod backward;
mod forward;
pub mod grad_check;
mod update;

#[cfg(test)]
mod backward_test;
#[cfg(test)]
mod forward_test;
