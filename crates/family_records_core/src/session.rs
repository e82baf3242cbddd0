//! crates/family_records_core/src/session.rs
//!
//! Per-session state handed explicitly to every view handler.

use crate::domain::Identity;
use crate::navigation::{transition, NavEvent, View};
use uuid::Uuid;

/// Which view is selected, which member is active, and any pending one-shot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub current_view: View,
    pub active_member: Option<Uuid>,
    pub pending_view: Option<View>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_view: View::MemberList,
            active_member: None,
            pending_view: None,
        }
    }
}

impl NavigationState {
    /// The state of a session that has just signed in.
    pub fn signed_in() -> Self {
        let mut state = Self {
            current_view: View::SignIn,
            ..Self::default()
        };
        state.apply(NavEvent::SignedIn);
        state
    }

    /// The view a transition is evaluated against: a pending request wins over the selector.
    pub fn effective_view(&self) -> View {
        self.pending_view.unwrap_or(self.current_view)
    }

    /// Feeds an event through the transition table. Returns `false` if it did not apply.
    pub fn apply(&mut self, event: NavEvent) -> bool {
        let Some(step) = transition(self.effective_view(), event) else {
            return false;
        };
        if step.one_shot {
            self.pending_view = Some(step.next);
        } else {
            self.current_view = step.next;
            self.pending_view = None;
        }
        true
    }

    /// Consumes the pending request, if any, and returns the view to render.
    pub fn resolve(&mut self) -> View {
        if let Some(view) = self.pending_view.take() {
            self.current_view = view;
        }
        self.current_view
    }

    pub fn open_member(&mut self, member_id: Uuid) -> bool {
        self.active_member = Some(member_id);
        self.apply(NavEvent::MemberOpened)
    }

    pub fn clear_active_member(&mut self) {
        self.active_member = None;
    }
}

/// A signed-in session: created at sign-in, persisted after each request, removed at sign-out.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub identity: Identity,
    pub navigation: NavigationState,
}

impl SessionContext {
    pub fn new(session_id: String, identity: Identity) -> Self {
        Self {
            session_id,
            identity,
            navigation: NavigationState::signed_in(),
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.identity.is_elevated()
    }
}
