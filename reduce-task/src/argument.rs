//! The "A" half of the protocol: one allocation per registered argument,
//! tracking how many of its futures have settled and notifying its parent
//! task exactly once, when the last one does.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use substrate::future::SettableFuture;

use crate::reducer::{ReadyPayload, Reducer};
use crate::task::ReduceTaskImpl;

type DestroyCb = Box<dyn FnOnce() + Send>;

/// An argument fed by a single future.
pub(crate) struct SingleReduceArgument<V, Red>
where
    V: Send + 'static,
    Red: Reducer<Contribution = V>,
{
    value: Mutex<Option<V>>,
    pending: AtomicUsize,
    parent: Weak<ReduceTaskImpl<Red>>,
    on_destroy: Mutex<Option<DestroyCb>>,
}

impl<V, Red> SingleReduceArgument<V, Red>
where
    V: Send + 'static,
    Red: Reducer<Contribution = V>,
{
    /// Builds the argument and registers its callback on `future`. If
    /// `future` has already settled, the argument may become ready and
    /// notify `parent` before this call returns.
    pub(crate) fn attach(
        future: Arc<dyn SettableFuture<V>>,
        parent: Weak<ReduceTaskImpl<Red>>,
        on_destroy: Option<DestroyCb>,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            value: Mutex::new(None),
            pending: AtomicUsize::new(1),
            parent,
            on_destroy: Mutex::new(on_destroy),
        });
        let registering = Arc::clone(&this);
        future.register_callback(Box::new(move |settled| match settled {
            Ok(v) => {
                *registering.value.lock() = Some(v.clone());
                if registering.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    registering.signal_ready();
                }
            }
            Err(e) => registering.poison_parent(Arc::clone(e)),
        }));
        this
    }

    fn signal_ready(self: &Arc<Self>) {
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        let value = self.value.lock().take().expect("value set before signal_ready");
        let on_destroy = self.on_destroy.lock().take();
        parent.ready(ReadyPayload::new(value, on_destroy));
    }

    fn poison_parent(self: &Arc<Self>, error: substrate::error::SharedError) {
        if let Some(parent) = self.parent.upgrade() {
            parent.poison(error);
        }
        if let Some(cb) = self.on_destroy.lock().take() {
            cb();
        }
    }
}

/// An argument fed by a pair of independently-settling futures.
pub(crate) struct PairReduceArgument<L, R, Red>
where
    L: Send + 'static,
    R: Send + 'static,
    Red: Reducer<Contribution = (L, R)>,
{
    left: Mutex<Option<L>>,
    right: Mutex<Option<R>>,
    pending: AtomicUsize,
    parent: Weak<ReduceTaskImpl<Red>>,
    on_destroy: Mutex<Option<DestroyCb>>,
}

impl<L, R, Red> PairReduceArgument<L, R, Red>
where
    L: Send + 'static,
    R: Send + 'static,
    Red: Reducer<Contribution = (L, R)>,
{
    pub(crate) fn attach(
        left: Arc<dyn SettableFuture<L>>,
        right: Arc<dyn SettableFuture<R>>,
        parent: Weak<ReduceTaskImpl<Red>>,
        on_destroy: Option<DestroyCb>,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            left: Mutex::new(None),
            right: Mutex::new(None),
            pending: AtomicUsize::new(2),
            parent,
            on_destroy: Mutex::new(on_destroy),
        });

        let left_half = Arc::clone(&this);
        left.register_callback(Box::new(move |settled| match settled {
            Ok(v) => {
                *left_half.left.lock() = Some(v.clone());
                if left_half.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    left_half.signal_ready();
                }
            }
            Err(e) => left_half.poison_parent(Arc::clone(e)),
        }));

        let right_half = Arc::clone(&this);
        right.register_callback(Box::new(move |settled| match settled {
            Ok(v) => {
                *right_half.right.lock() = Some(v.clone());
                if right_half.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    right_half.signal_ready();
                }
            }
            Err(e) => right_half.poison_parent(Arc::clone(e)),
        }));

        this
    }

    fn signal_ready(self: &Arc<Self>) {
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        let l = self.left.lock().take().expect("left set before signal_ready");
        let r = self.right.lock().take().expect("right set before signal_ready");
        let on_destroy = self.on_destroy.lock().take();
        parent.ready(ReadyPayload::new((l, r), on_destroy));
    }

    fn poison_parent(self: &Arc<Self>, error: substrate::error::SharedError) {
        if let Some(parent) = self.parent.upgrade() {
            parent.poison(error);
        }
        if let Some(cb) = self.on_destroy.lock().take() {
            cb();
        }
    }
}
