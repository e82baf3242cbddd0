//! crates/family_records_core/src/navigation.rs
//!
//! The view state machine. Every way of moving between views is listed in
//! [`transition`]; the session layer only records its result.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The screens of the application. `SignIn` is the only one reachable without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    SignIn,
    MemberList,
    AddMember,
    MemberDetail,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::SignIn => "sign_in",
            View::MemberList => "member_list",
            View::AddMember => "add_member",
            View::MemberDetail => "member_detail",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown view: {0}")]
pub struct UnknownView(pub String);

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign_in" => Ok(View::SignIn),
            "member_list" => Ok(View::MemberList),
            "add_member" => Ok(View::AddMember),
            "member_detail" => Ok(View::MemberDetail),
            other => Err(UnknownView(other.to_string())),
        }
    }
}

/// Something that happened in the UI which may move the user to another view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    SignedIn,
    SignedOut,
    /// The view selector was changed.
    Selected(View),
    /// A member was opened from the member list.
    MemberOpened,
    /// The active member no longer exists.
    MemberMissing,
}

/// The outcome of a transition.
///
/// A `one_shot` step is a navigation request that overrides the selected view on the
/// next render only; otherwise the step replaces the selected view itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: View,
    pub one_shot: bool,
}

impl Step {
    fn persisted(next: View) -> Option<Self> {
        Some(Self { next, one_shot: false })
    }

    fn one_shot(next: View) -> Option<Self> {
        Some(Self { next, one_shot: true })
    }
}

/// `{current view} x {event} -> {next view}`. `None` means the event does not apply.
pub fn transition(current: View, event: NavEvent) -> Option<Step> {
    use NavEvent::*;
    use View::*;

    match (current, event) {
        (SignIn, SignedIn) => Step::persisted(MemberList),
        (_, SignedOut) => Step::persisted(SignIn),
        (SignIn, _) => None,
        (_, SignedIn) => None,
        (_, Selected(SignIn)) => None,
        (_, Selected(target)) => Step::persisted(target),
        (_, MemberOpened) => Step::one_shot(MemberDetail),
        (MemberDetail, MemberMissing) => Step::one_shot(MemberList),
        (_, MemberMissing) => None,
    }
}
