pub mod dispatch;
pub mod fetch_step;
pub mod reconcile;

/// What a fetch step did with one work item. The caller owns acking: dropped
/// items are removed immediately, deferred items redeliver after their
/// visibility window, and staged items stay queued until the reconciler
/// joins the pair and acks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A staging record was written; the change event will drive the join.
    Staged,
    /// Permanently unusable item (malformed body, missing quote); remove it.
    Dropped,
    /// Transient failure; leave the item for redelivery.
    Deferred,
}
