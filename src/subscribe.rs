use crate::severity::Severity;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// Event categories the adapter can subscribe to. One bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Response = 0,
    ResponseTrace = 1,
    RequestError = 2,
    RequestDebug = 3,
    RequestApp = 4,
    ServerDebug = 5,
    ServerApp = 6,
    Lifecycle = 7,
}

impl EventCategory {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of categories toggled together against one reference level.
///
/// The reference is the highest severity the member categories can
/// emit, so the group is active exactly when some member output could
/// pass the logger threshold.
#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub name: &'static str,
    pub reference: Severity,
    pub members: &'static [EventCategory],
}

/// Is a group with this reference level visible under `threshold`?
pub fn group_active(reference: Severity, threshold: Severity) -> bool {
    reference.value() >= threshold.value()
}

/// Pure diff: which groups flip state when the threshold moves from
/// `old` to `new`. `old = None` means the previous state is unknown
/// (first call), so every group is reported with its desired state.
pub fn transitions(
    groups: &[CategoryGroup],
    old: Option<Severity>,
    new: Severity,
) -> Vec<(usize, bool)> {
    groups
        .iter()
        .enumerate()
        .filter_map(|(idx, group)| {
            let now = group_active(group.reference, new);
            match old {
                Some(old) if group_active(group.reference, old) == now => None,
                _ => Some((idx, now)),
            }
        })
        .collect()
}

/// Tracks which categories are currently worth translating for one
/// logger. The apply step is the only side-effecting part: it flips
/// group state per the pure diff and rebuilds the category bitset.
pub struct SubscriptionManager {
    groups: Vec<CategoryGroup>,
    active: Mutex<Vec<bool>>,
    enabled: AtomicU8,
}

impl SubscriptionManager {
    pub fn new(groups: Vec<CategoryGroup>) -> SubscriptionManager {
        let active = vec![false; groups.len()];
        SubscriptionManager {
            groups,
            active: Mutex::new(active),
            enabled: AtomicU8::new(0),
        }
    }

    /// Apply a threshold change. Call once eagerly at initialization
    /// with `old = None`, then on every runtime threshold change.
    pub fn apply(&self, old: Option<Severity>, new: Severity) {
        let mut active = self.active.lock().expect("subscription state poisoned");
        for (idx, now) in transitions(&self.groups, old, new) {
            active[idx] = now;
        }
        let mut mask = 0u8;
        for (group, on) in self.groups.iter().zip(active.iter()) {
            if *on {
                for member in group.members {
                    mask |= member.bit();
                }
            }
        }
        self.enabled.store(mask, Ordering::Relaxed);
    }

    /// Cheap check consulted before any translation work.
    pub fn is_enabled(&self, category: EventCategory) -> bool {
        self.enabled.load(Ordering::Relaxed) & category.bit() != 0
    }

    /// Current group states, for introspection.
    pub fn states(&self) -> Vec<(&'static str, bool)> {
        let active = self.active.lock().expect("subscription state poisoned");
        self.groups
            .iter()
            .zip(active.iter())
            .map(|(group, on)| (group.name, *on))
            .collect()
    }
}

/// Groups tracked against the response logger threshold.
pub fn response_groups() -> Vec<CategoryGroup> {
    vec![
        CategoryGroup {
            // The gate can force any level up to fatal, so response
            // lines stay subscribed for every non-silent threshold.
            name: "response",
            reference: Severity::Fatal,
            members: &[EventCategory::Response],
        },
        CategoryGroup {
            name: "response-trace",
            reference: Severity::Trace,
            members: &[EventCategory::ResponseTrace],
        },
    ]
}

/// Groups tracked against the event logger threshold.
pub fn event_groups() -> Vec<CategoryGroup> {
    vec![
        CategoryGroup {
            name: "diagnostics",
            reference: Severity::Debug,
            members: &[EventCategory::RequestDebug, EventCategory::ServerDebug],
        },
        CategoryGroup {
            name: "events",
            reference: Severity::Fatal,
            members: &[
                EventCategory::RequestError,
                EventCategory::RequestApp,
                EventCategory::ServerApp,
                EventCategory::Lifecycle,
            ],
        },
    ]
}
