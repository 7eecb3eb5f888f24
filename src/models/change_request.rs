// src/models/change_request.rs
use super::shift::{Shift, ShiftKind};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum RequestState {
    New,
    Pending,
    #[sqlx(rename = "Not Approved")]
    #[serde(rename = "Not Approved")]
    NotApproved,
    Approved,
}

impl RequestState {
    pub const ALL: [RequestState; 4] = [
        RequestState::New,
        RequestState::Pending,
        RequestState::NotApproved,
        RequestState::Approved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::New => "New",
            RequestState::Pending => "Pending",
            RequestState::NotApproved => "Not Approved",
            RequestState::Approved => "Approved",
        }
    }

    /// URL-friendly form, e.g. `not_approved`.
    pub fn slug(&self) -> &'static str {
        match self {
            RequestState::New => "new",
            RequestState::Pending => "pending",
            RequestState::NotApproved => "not_approved",
            RequestState::Approved => "approved",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Approved | RequestState::NotApproved)
    }

    /// New -> {Pending, Approved, Not Approved}, Pending -> {Approved, Not Approved}.
    /// Only SI requests go through Pending.
    pub fn can_transition_to(&self, to: RequestState, kind: ShiftKind) -> bool {
        match (self, to) {
            (RequestState::New, RequestState::Pending) => kind == ShiftKind::Si,
            (RequestState::New | RequestState::Pending, RequestState::Approved) => true,
            (RequestState::New | RequestState::Pending, RequestState::NotApproved) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RequestState::ALL
            .into_iter()
            .find(|state| {
                state.as_str().eq_ignore_ascii_case(wanted) || state.slug().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("'{}' is not a valid request state", wanted))
    }
}

/// Which of the three mutually exclusive effects a request has on approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    CreateShift,
    EditShift,
    DropShift,
}

impl RequestAction {
    pub fn of(is_drop_request: bool, creates_shift: bool) -> RequestAction {
        match (is_drop_request, creates_shift) {
            (true, _) => RequestAction::DropShift,
            (false, true) => RequestAction::CreateShift,
            (false, false) => RequestAction::EditShift,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestAction::CreateShift => "New shift",
            RequestAction::EditShift => "Change",
            RequestAction::DropShift => "Drop",
        }
    }
}

// Row of the `shift_change_requests` table
#[derive(Debug, Clone, FromRow)]
pub struct ShiftChangeRequest {
    pub id: i64,
    pub kind: ShiftKind,
    pub target_shift_id: Option<i64>,
    pub reason: String,
    pub state: RequestState,
    pub is_drop_request: bool,
    pub creates_shift: bool,
    pub requested_by_id: Option<i64>,
    pub created_on: NaiveDateTime,
    pub approved_by_id: Option<i64>,
    pub approved_on: Option<NaiveDateTime>,
    pub new_associated_person_id: Option<i64>,
    pub new_start: Option<NaiveDateTime>,
    pub new_duration_secs: Option<i64>,
    pub new_location: Option<String>,
    pub new_kind: Option<ShiftKind>,
}

impl ShiftChangeRequest {
    pub fn action(&self) -> RequestAction {
        RequestAction::of(self.is_drop_request, self.creates_shift)
    }

    pub fn proposed_fields(&self) -> ShiftFields {
        ShiftFields {
            associated_person_id: self.new_associated_person_id,
            start: self.new_start,
            duration_secs: self.new_duration_secs,
            location: self.new_location.clone(),
            kind: self.new_kind,
        }
    }
}

/// A change request joined with the names shown in listings.
#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub id: i64,
    pub kind: ShiftKind,
    pub target_shift_id: Option<i64>,
    pub reason: String,
    pub state: RequestState,
    pub is_drop_request: bool,
    pub creates_shift: bool,
    pub created_on: NaiveDateTime,
    pub new_start: Option<NaiveDateTime>,
    pub new_location: Option<String>,
    pub requested_by: Option<String>,
    pub shift_start: Option<NaiveDateTime>,
    pub shift_location: Option<String>,
}

impl RequestRow {
    pub fn action_label(&self) -> &'static str {
        RequestAction::of(self.is_drop_request, self.creates_shift).label()
    }
}

/// Optional shift fields: what a request proposes, or what an approver finally submits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftFields {
    pub associated_person_id: Option<i64>,
    pub start: Option<NaiveDateTime>,
    pub duration_secs: Option<i64>,
    pub location: Option<String>,
    pub kind: Option<ShiftKind>,
}

impl ShiftFields {
    /// Field-wise merge: keeps our value when present, otherwise takes `fallback`'s.
    pub fn or(self, fallback: ShiftFields) -> ShiftFields {
        ShiftFields {
            associated_person_id: self.associated_person_id.or(fallback.associated_person_id),
            start: self.start.or(fallback.start),
            duration_secs: self.duration_secs.or(fallback.duration_secs),
            location: self.location.or(fallback.location),
            kind: self.kind.or(fallback.kind),
        }
    }

    /// Copies every present field onto `shift`; absent fields leave it unchanged.
    pub fn apply_to(&self, shift: &mut Shift) {
        if let Some(person) = self.associated_person_id {
            shift.associated_person_id = person;
        }
        if let Some(start) = self.start {
            shift.start = start;
        }
        if let Some(duration) = self.duration_secs {
            shift.duration_secs = duration;
        }
        if let Some(location) = &self.location {
            shift.location = location.clone();
        }
        if let Some(kind) = self.kind {
            shift.kind = kind;
        }
    }

    pub fn from_shift(shift: &Shift) -> ShiftFields {
        ShiftFields {
            associated_person_id: Some(shift.associated_person_id),
            start: Some(shift.start),
            duration_secs: Some(shift.duration_secs),
            location: Some(shift.location.clone()),
            kind: Some(shift.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn transitions_follow_the_workflow() {
        use RequestState::*;
        assert!(New.can_transition_to(Approved, ShiftKind::Tutoring));
        assert!(New.can_transition_to(NotApproved, ShiftKind::Tutoring));
        assert!(New.can_transition_to(Pending, ShiftKind::Si));
        assert!(!New.can_transition_to(Pending, ShiftKind::Tutoring));
        assert!(Pending.can_transition_to(Approved, ShiftKind::Si));
        assert!(Pending.can_transition_to(NotApproved, ShiftKind::Si));
        assert!(!Approved.can_transition_to(NotApproved, ShiftKind::Si));
        assert!(!NotApproved.can_transition_to(Approved, ShiftKind::Si));
        assert!(!Pending.can_transition_to(New, ShiftKind::Si));
    }

    #[test]
    fn state_parses_names_and_slugs() {
        assert_eq!("Not Approved".parse::<RequestState>().unwrap(), RequestState::NotApproved);
        assert_eq!("not_approved".parse::<RequestState>().unwrap(), RequestState::NotApproved);
        assert_eq!("new".parse::<RequestState>().unwrap(), RequestState::New);
        assert!("Denied!".parse::<RequestState>().is_err());
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut shift = Shift {
            id: 1,
            associated_person_id: 5,
            start: at(9),
            duration_secs: 3600,
            location: "LRC".into(),
            kind: ShiftKind::Tutoring,
        };
        let fields = ShiftFields {
            location: Some("GSMN 64".into()),
            start: Some(at(13)),
            ..Default::default()
        };
        fields.apply_to(&mut shift);
        assert_eq!(shift.location, "GSMN 64");
        assert_eq!(shift.start, at(13));
        assert_eq!(shift.associated_person_id, 5);
        assert_eq!(shift.duration_secs, 3600);
        assert_eq!(shift.kind, ShiftKind::Tutoring);
    }

    #[test]
    fn merge_prefers_own_values() {
        let own = ShiftFields {
            duration_secs: Some(1800),
            ..Default::default()
        };
        let fallback = ShiftFields {
            duration_secs: Some(3600),
            location: Some("ILC".into()),
            ..Default::default()
        };
        let merged = own.or(fallback);
        assert_eq!(merged.duration_secs, Some(1800));
        assert_eq!(merged.location.as_deref(), Some("ILC"));
        assert_eq!(merged.start, None);
    }
}
