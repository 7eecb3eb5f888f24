// src/templates.rs
use crate::{
    error::AppResult,
    forms::{
        format_duration, ChangeRequestForm, CourseForm, CreateUserForm, LoanForm, ProfileForm, ShiftForm,
        TutorShiftForm, LOAN_DATETIME_FORMAT,
    },
    models::{
        change_request::RequestRow,
        course::Course,
        display_datetime, display_optional_datetime,
        hardware::{Hardware, LoanRow},
        shift::{ShiftKind, ShiftRow},
        user::{CurrentUser, User, SIS, TUTORS},
    },
    services::change_request_service::AlertCounts,
    web::flash::FlashMessage,
};
use askama::Template;
use axum::response::Html;

pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    Ok(Html(template.render()?))
}

// --- Shared page state ---

/// What `base.html` needs on every page: who is logged in, pending flash
/// messages and, for privileged users, the number of New requests.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub logged_in: bool,
    pub user_id: i64,
    pub display_name: String,
    pub is_privileged: bool,
    pub is_tutor: bool,
    pub is_si: bool,
    pub messages: Vec<FlashMessage>,
    pub si_alerts: i64,
    pub tutoring_alerts: i64,
}

impl PageContext {
    pub fn new(user: Option<&CurrentUser>, messages: Vec<FlashMessage>, alerts: AlertCounts) -> Self {
        match user {
            Some(user) => PageContext {
                logged_in: true,
                user_id: user.id,
                display_name: user.display_name.clone(),
                is_privileged: user.is_privileged(),
                is_tutor: user.in_any_group(&[TUTORS]),
                is_si: user.in_any_group(&[SIS]),
                messages,
                si_alerts: alerts.si,
                tutoring_alerts: alerts.tutoring,
            },
            None => PageContext {
                messages,
                ..Default::default()
            },
        }
    }
}

// --- View models ---

#[derive(Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    pub fn new(value: impl ToString, label: impl Into<String>, current: &str) -> Self {
        let value = value.to_string();
        Choice {
            selected: value == current,
            value,
            label: label.into(),
        }
    }
}

pub fn people_choices(users: &[User], current: &str) -> Vec<Choice> {
    users
        .iter()
        .map(|u| Choice::new(u.id, format!("{} ({})", u.display_name(), u.username), current))
        .collect()
}

pub fn kind_choices(current: &str) -> Vec<Choice> {
    ShiftKind::ALL
        .iter()
        .map(|k| Choice::new(k.as_str(), k.as_str(), current))
        .collect()
}

pub fn course_choices(courses: &[Course], current: &[String]) -> Vec<Choice> {
    courses
        .iter()
        .map(|c| {
            let value = c.id.to_string();
            Choice {
                selected: current.contains(&value),
                value,
                label: c.display(),
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ShiftView {
    pub id: i64,
    pub person_id: i64,
    pub person: String,
    pub start: String,
    pub end: String,
    pub time: String,
    pub duration: String,
    pub location: String,
    pub kind: String,
    pub title: String,
}

impl From<&ShiftRow> for ShiftView {
    fn from(shift: &ShiftRow) -> Self {
        ShiftView {
            id: shift.id,
            person_id: shift.associated_person_id,
            person: shift.person(),
            start: display_datetime(&shift.start),
            end: display_datetime(&shift.end()),
            time: format!("{}-{}", shift.start.format("%H:%M"), shift.end().format("%H:%M")),
            duration: format_duration(shift.duration_secs),
            location: shift.location.clone(),
            kind: shift.kind.to_string(),
            title: shift.title(),
        }
    }
}

pub fn shift_views(shifts: &[ShiftRow]) -> Vec<ShiftView> {
    shifts.iter().map(ShiftView::from).collect()
}

#[derive(Debug, Clone)]
pub struct RequestView {
    pub id: i64,
    pub kind: String,
    pub action: String,
    pub state: String,
    pub reason: String,
    pub created_on: String,
    pub requested_by: String,
    pub shift: String,
    pub url: String,
}

impl From<&RequestRow> for RequestView {
    fn from(request: &RequestRow) -> Self {
        let shift = match (&request.shift_start, &request.shift_location) {
            (Some(start), Some(location)) => format!("{} at {}", location, display_datetime(start)),
            _ => match (&request.new_start, &request.new_location) {
                (Some(start), Some(location)) => format!("New: {} at {}", location, display_datetime(start)),
                _ => "-".to_string(),
            },
        };
        RequestView {
            id: request.id,
            kind: request.kind.to_string(),
            action: request.action_label().to_string(),
            state: request.state.to_string(),
            reason: request.reason.clone(),
            created_on: display_datetime(&request.created_on),
            requested_by: request.requested_by.clone().unwrap_or_default(),
            shift,
            url: format!(
                "/scheduling/shift_change_requests/{}/{}/n",
                request.kind.as_str(),
                request.id
            ),
        }
    }
}

pub fn request_views(requests: &[RequestRow]) -> Vec<RequestView> {
    requests.iter().map(RequestView::from).collect()
}

#[derive(Debug, Clone)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            username: user.username.clone(),
            name: user.display_name(),
            email: user.email.clone(),
        }
    }
}

pub fn user_views(users: &[User]) -> Vec<UserView> {
    users.iter().map(UserView::from).collect()
}

#[derive(Debug, Clone)]
pub struct CourseView {
    pub id: i64,
    pub short_name: String,
    pub name: String,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        CourseView {
            id: course.id,
            short_name: course.short_name(),
            name: course.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoanView {
    pub id: i64,
    pub hardware: String,
    pub borrower: String,
    pub start_time: String,
    pub return_time: String,
}

impl From<&LoanRow> for LoanView {
    fn from(loan: &LoanRow) -> Self {
        LoanView {
            id: loan.id,
            hardware: loan.hardware_name.clone(),
            borrower: loan.borrower(),
            start_time: display_datetime(&loan.start_time),
            return_time: display_optional_datetime(&loan.return_time),
        }
    }
}

pub fn loan_views(loans: &[LoanRow]) -> Vec<LoanView> {
    loans.iter().map(LoanView::from).collect()
}

/// Loan form values in the format the form expects back.
pub fn loan_form_from(loan: &LoanRow) -> LoanForm {
    LoanForm {
        target: loan.hardware_id.to_string(),
        hardware_user: loan.borrower_id.to_string(),
        start_time: loan.start_time.format(LOAN_DATETIME_FORMAT).to_string(),
        return_time: loan
            .return_time
            .map(|t| t.format(LOAN_DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
    }
}

/// One line of the request detail table.
#[derive(Debug, Clone)]
pub struct FieldRow {
    pub label: String,
    pub current: String,
    pub proposed: String,
}

#[derive(Debug, Clone)]
pub struct DateField {
    pub name: String,
    pub label: String,
    pub value: String,
}

impl DateField {
    pub fn new(name: &str, label: &str, value: &str) -> Self {
        DateField {
            name: name.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleRowView {
    pub course_id: i64,
    pub course: String,
    pub days: Vec<Vec<ShiftView>>,
}

// --- Accounts ---

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub ctx: PageContext,
    pub error: String,
    pub username: String,
    pub next: String,
}

#[derive(Template)]
#[template(path = "password_change.html")]
pub struct PasswordChangePage {
    pub ctx: PageContext,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub ctx: PageContext,
    pub requests: Vec<RequestView>,
}

// --- Courses ---

#[derive(Template)]
#[template(path = "courses/list.html")]
pub struct CourseListPage {
    pub ctx: PageContext,
    pub courses: Vec<CourseView>,
}

#[derive(Template)]
#[template(path = "courses/detail.html")]
pub struct CourseDetailPage {
    pub ctx: PageContext,
    pub course: CourseView,
    pub tutors: Vec<UserView>,
    pub sis: Vec<UserView>,
}

#[derive(Template)]
#[template(path = "courses/form.html")]
pub struct CourseFormPage {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub form: CourseForm,
    pub errors: Vec<String>,
}

// --- Users ---

#[derive(Template)]
#[template(path = "users/list.html")]
pub struct UserListPage {
    pub ctx: PageContext,
    pub group: String,
    pub users: Vec<UserView>,
}

#[derive(Template)]
#[template(path = "users/profile.html")]
pub struct ProfilePage {
    pub ctx: PageContext,
    pub profile: UserView,
    pub groups: String,
    pub si_course: String,
    pub courses_tutored: Vec<CourseView>,
    pub can_edit: bool,
    pub shifts: Vec<ShiftView>,
    /// Calendar events, already escaped for a `<script>` block.
    pub events_json: String,
}

#[derive(Template)]
#[template(path = "users/edit.html")]
pub struct ProfileFormPage {
    pub ctx: PageContext,
    pub user_id: i64,
    pub form: ProfileForm,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/create.html")]
pub struct CreateUserPage {
    pub ctx: PageContext,
    pub form: CreateUserForm,
    pub si_courses: Vec<Choice>,
    pub tutored_courses: Vec<Choice>,
    pub groups: Vec<Choice>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/bulk.html")]
pub struct BulkUsersPage {
    pub ctx: PageContext,
    pub user_data: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/requests.html")]
pub struct UserRequestsPage {
    pub ctx: PageContext,
    pub profile: UserView,
    pub requests: Vec<RequestView>,
}

// --- Shifts ---

#[derive(Template)]
#[template(path = "shifts/detail.html")]
pub struct ShiftDetailPage {
    pub ctx: PageContext,
    pub shift: ShiftView,
    pub requests: Vec<RequestView>,
    pub is_owner: bool,
}

#[derive(Template)]
#[template(path = "shifts/form.html")]
pub struct ShiftFormPage {
    pub ctx: PageContext,
    pub form: ShiftForm,
    pub people: Vec<Choice>,
    pub kinds: Vec<Choice>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "shifts/tutoring_form.html")]
pub struct TutorShiftPage {
    pub ctx: PageContext,
    pub form: TutorShiftForm,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "requests/form.html")]
pub struct ChangeRequestPage {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    /// Empty when the request proposes a new shift.
    pub shift: String,
    pub form: ChangeRequestForm,
    pub people: Vec<Choice>,
    pub kinds: Vec<Choice>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "requests/drop_form.html")]
pub struct DropRequestPage {
    pub ctx: PageContext,
    pub action: String,
    pub shift: String,
    pub reason: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "requests/list.html")]
pub struct RequestListPage {
    pub ctx: PageContext,
    pub kind: String,
    pub state: String,
    pub states: Vec<Choice>,
    pub requests: Vec<RequestView>,
}

#[derive(Template)]
#[template(path = "requests/detail.html")]
pub struct RequestDetailPage {
    pub ctx: PageContext,
    pub request: RequestView,
    pub fields: Vec<FieldRow>,
    pub approved_by: String,
    pub approved_on: String,
    pub can_decide: bool,
    pub can_mark_pending: bool,
    pub base_url: String,
}

#[derive(Template)]
#[template(path = "requests/approval_form.html")]
pub struct ApprovalFormPage {
    pub ctx: PageContext,
    pub request: RequestView,
    pub action: String,
    pub form: ChangeRequestForm,
    pub people: Vec<Choice>,
    pub kinds: Vec<Choice>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "schedule.html")]
pub struct SchedulePage {
    pub ctx: PageContext,
    pub kind: String,
    pub kinds: Vec<Choice>,
    pub prev_offset: i64,
    pub next_offset: i64,
    pub weekdays: Vec<String>,
    pub rows: Vec<ScheduleRowView>,
}

// --- Bulk editing ---

/// Date form shared by the three bulk workflows.
#[derive(Template)]
#[template(path = "bulk/date_form.html")]
pub struct BulkDateFormPage {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub method: String,
    pub fields: Vec<DateField>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "bulk/drop_confirm.html")]
pub struct DropOnDateConfirmPage {
    pub ctx: PageContext,
    pub date: String,
    pub token: String,
    pub shifts: Vec<ShiftView>,
}

#[derive(Template)]
#[template(path = "bulk/swap_confirm.html")]
pub struct SwapDatesConfirmPage {
    pub ctx: PageContext,
    pub first: String,
    pub second: String,
    pub first_shifts: Vec<ShiftView>,
    pub second_shifts: Vec<ShiftView>,
}

#[derive(Template)]
#[template(path = "bulk/move_confirm.html")]
pub struct MoveShiftsConfirmPage {
    pub ctx: PageContext,
    pub from: String,
    pub to: String,
    pub shifts: Vec<ShiftView>,
}

// --- Hardware ---

#[derive(Template)]
#[template(path = "hardware/list.html")]
pub struct HardwareListPage {
    pub ctx: PageContext,
    pub hardware: Vec<Hardware>,
    pub loans: Vec<LoanView>,
}

#[derive(Template)]
#[template(path = "hardware/form.html")]
pub struct HardwareFormPage {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub name: String,
    pub is_available: bool,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "hardware/loans.html")]
pub struct LoanListPage {
    pub ctx: PageContext,
    pub loans: Vec<LoanView>,
}

#[derive(Template)]
#[template(path = "hardware/loan_form.html")]
pub struct LoanFormPage {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
    pub form: LoanForm,
    pub hardware: Vec<Choice>,
    pub people: Vec<Choice>,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_mark_the_current_value() {
        let kinds = kind_choices("Tutoring");
        assert_eq!(kinds.len(), 2);
        assert!(!kinds[0].selected);
        assert!(kinds[1].selected);
    }

    #[test]
    fn anonymous_context_has_no_privileges() {
        let ctx = PageContext::new(None, Vec::new(), AlertCounts { si: 3, tutoring: 1 });
        assert!(!ctx.logged_in);
        assert!(!ctx.is_privileged);
        assert_eq!(ctx.si_alerts, 0);
    }
}
