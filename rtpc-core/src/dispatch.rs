//! Push-path fan-out: from one applied value change to every target that
//! should hear about it.

use rtpc_types::{ParamId, RtpcKey, SubscriberId, SubscriberKind};

use crate::directory::{ExceptionChecker, TargetDirectory};
use crate::targets::TargetTable;
use crate::values::ValueStore;

/// Skips targets governed by a narrower value of the parameter being set.
pub struct StoreExceptionChecker<'a> {
    store: &'a ValueStore,
    update_key: RtpcKey,
}

impl<'a> StoreExceptionChecker<'a> {
    pub fn new(store: &'a ValueStore, update_key: RtpcKey) -> Self {
        Self { store, update_key }
    }
}

impl ExceptionChecker for StoreExceptionChecker<'_> {
    fn is_exception(&self, target_key: &RtpcKey) -> bool {
        self.store.check_exception(&self.update_key, target_key)
    }
}

/// One subscription's notification within an update pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingDispatch {
    pub kind: SubscriberKind,
    pub subscriber: SubscriberId,
    /// Target param the subscription produces
    pub param: ParamId,
    pub value: f32,
    pub delta: f32,
}

/// Order a pass by subscriber category, then subscriber, then param, so
/// earlier categories observe the update first.
pub(crate) fn sort_by_priority(pending: &mut [PendingDispatch]) {
    pending.sort_by_key(|d| (d.kind, d.subscriber, d.param));
}

/// Deliver one subscription's value to the targets in `directory` matching
/// `update_key`. Returns the number of targets notified.
pub(crate) fn fan_out(
    directory: &TargetDirectory,
    targets: &mut TargetTable,
    pending: &PendingDispatch,
    update_key: &RtpcKey,
    exceptions: Option<&dyn ExceptionChecker>,
) -> usize {
    let count = directory.push_param_update(pending.param, update_key, exceptions, |handle| {
        match targets.get_mut(handle) {
            Some(entry) => entry
                .target
                .update_target_param(pending.param, pending.value, pending.delta),
            None => debug_assert!(false, "directory holds stale target {:?}", handle),
        }
    });
    log::trace!(
        target: "rtpc::dispatch",
        "{:?} {} param {} {} -> {} targets (value {}, delta {})",
        pending.kind,
        pending.subscriber,
        pending.param,
        update_key,
        count,
        pending.value,
        pending.delta
    );
    count
}
