//! Content type lifecycle events.

use tracing::debug;

use crate::content_type::ContentType;

/// Point in a content type's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTypeEventKind {
    /// Before saving; cancelable.
    Saving,
    /// After saving.
    Saved,
    /// Before deleting; cancelable.
    Deleting,
    /// After deleting.
    Deleted,
}

impl ContentTypeEventKind {
    /// Returns true for the events a handler may cancel.
    #[must_use]
    pub const fn is_cancelable(self) -> bool {
        matches!(self, Self::Saving | Self::Deleting)
    }
}

/// An event raised by the content type service.
#[derive(Debug, Clone, Copy)]
pub struct ContentTypeEvent<'a> {
    /// Lifecycle point.
    pub kind: ContentTypeEventKind,
    /// Types involved.
    pub types: &'a [ContentType],
}

impl<'a> ContentTypeEvent<'a> {
    /// Creates an event.
    #[must_use]
    pub const fn new(kind: ContentTypeEventKind, types: &'a [ContentType]) -> Self {
        Self { kind, types }
    }
}

/// Delivers content type events to interested parties.
pub trait EventDispatcher: Send + Sync {
    /// Delivers a cancelable event. Returns true if a handler cancelled it.
    fn dispatch_cancelable(&self, event: &ContentTypeEvent<'_>) -> bool;

    /// Delivers a notification.
    fn dispatch(&self, event: &ContentTypeEvent<'_>);
}

/// Dispatcher with no handlers; nothing is ever cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn dispatch_cancelable(&self, event: &ContentTypeEvent<'_>) -> bool {
        debug!(kind = ?event.kind, count = event.types.len(), "Content type event");
        false
    }

    fn dispatch(&self, event: &ContentTypeEvent<'_>) {
        debug!(kind = ?event.kind, count = event.types.len(), "Content type event");
    }
}
