// src/services/seed_service.rs
//! Fills a database with demo data: an admin account, synthetic staff, courses,
//! shifts, hardware and change requests, plus optional CSV rosters of real people.

use crate::{
    error::{AppError, AppResult},
    forms::{parse_datetime, parse_duration, FormErrors},
    models::{
        change_request::ShiftFields,
        course::CourseData,
        hardware::HardwareData,
        shift::{NewShift, ShiftKind},
        user::{CurrentUser, NewUser, SIS, SUPERVISORS, TUTORS},
    },
    services::{change_request_service, course_service, hardware_service, shift_service, user_service},
};
use chrono::{Local, NaiveTime, TimeDelta};
use rand::{rngs::StdRng, seq::IndexedRandom, Rng, SeedableRng};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::{collections::HashMap, io, path::PathBuf};

/// Password given to every seeded account except the superuser.
pub const DEFAULT_PASSWORD: &str = "password";

const DEPARTMENTS: &[&str] = &[
    "ACCOUNTG", "BIOLOGY", "CE-ENGIN", "COMPSCI", "FRENCHST", "JAPANESE", "MATH", "NUTRITN", "STATISTC",
];
const TOPICS: &[&str] = &[
    "Foundations", "Methods", "Principles", "Analysis", "Programming", "Theory", "Applications",
];
const LOCATIONS: &[&str] = &["ELAB", "HAS", "ILC", "LGRC", "MOR3", "TOTM"];
const HARDWARE_TYPES: &[&str] = &["Projector", "Calculator", "Laptop", "Power adapter"];
const FIRST_NAMES: &[&str] = &[
    "Alex", "Jordan", "Sam", "Taylor", "Morgan", "Casey", "Riley", "Jamie", "Avery", "Quinn",
];
const LAST_NAMES: &[&str] = &[
    "Nguyen", "Smith", "Garcia", "Kim", "Patel", "Johnson", "Lopez", "Chen", "Brown", "Silva",
];

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub superuser_username: String,
    pub superuser_password: String,
    pub user_count: usize,
    pub course_count: usize,
    pub shift_count: usize,
    pub hardware_count: usize,
    pub change_request_count: usize,
    pub seed: Option<u64>,
    pub si_roster: Option<PathBuf>,
    pub supervisor_roster: Option<PathBuf>,
    pub shift_roster: Option<PathBuf>,
    pub exam_review_roster: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub users: usize,
    pub courses: usize,
    pub shifts: usize,
    pub hardware: usize,
    pub change_requests: usize,
}

// --- Rosters ---

#[derive(Debug, Clone, Deserialize)]
pub struct SiRosterRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorRosterRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShiftRosterRow {
    pub username: String,
    pub start: String,
    pub duration: String,
    pub location: String,
    pub kind: String,
}

/// Exam review sessions, held by SI leaders.
#[derive(Debug, Clone, Deserialize)]
pub struct ExamReviewRosterRow {
    pub username: String,
    pub start: String,
    pub duration: String,
    pub location: String,
}

/// Reads a headed CSV into typed rows. Columns are matched by header name.
pub fn read_roster<T, R>(reader: R) -> AppResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: io::Read,
{
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = csv_reader
        .deserialize::<T>()
        .collect::<Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

fn read_roster_file<T>(path: &PathBuf) -> AppResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    tracing::info!("Reading roster {}", path.display());
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_roster(file)
}

async fn find_or_create_course(db_pool: &SqlitePool, department: &str, number: i64) -> AppResult<(i64, bool)> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM courses WHERE department = ?1 AND number = ?2")
            .bind(department)
            .bind(number)
            .fetch_optional(db_pool)
            .await?;
    if let Some(id) = existing {
        return Ok((id, false));
    }
    let id = course_service::create_course(
        db_pool,
        &CourseData {
            department: department.to_string(),
            number,
            name: format!("{} {}", department, number),
        },
    )
    .await?;
    Ok((id, true))
}

/// SI leaders with their course; missing courses are created on the fly.
pub async fn import_si_roster(db_pool: &SqlitePool, rows: &[SiRosterRow]) -> AppResult<BootstrapReport> {
    let mut report = BootstrapReport::default();
    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        let (course_id, created) = find_or_create_course(db_pool, &row.department, row.number).await?;
        if created {
            report.courses += 1;
        }
        users.push(NewUser {
            username: row.username.clone(),
            email: row.email.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            password: DEFAULT_PASSWORD.to_string(),
            si_course_id: Some(course_id),
            groups: vec![SIS.to_string()],
            ..Default::default()
        });
    }
    report.users = user_service::create_users_in_bulk(db_pool, &users).await?.len();
    Ok(report)
}

pub async fn import_supervisor_roster(db_pool: &SqlitePool, rows: &[SupervisorRosterRow]) -> AppResult<usize> {
    let users: Vec<NewUser> = rows
        .iter()
        .map(|row| NewUser {
            username: row.username.clone(),
            email: row.email.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            password: DEFAULT_PASSWORD.to_string(),
            groups: vec![SUPERVISORS.to_string()],
            ..Default::default()
        })
        .collect();
    Ok(user_service::create_users_in_bulk(db_pool, &users).await?.len())
}

fn roster_error(roster: &'static str, line: usize, message: String) -> AppError {
    AppError::Validation(FormErrors::single(roster, format!("Line {}: {}", line, message)))
}

/// Shifts for people already in the database, matched by username.
pub async fn import_shift_roster(db_pool: &SqlitePool, rows: &[ShiftRosterRow]) -> AppResult<usize> {
    let mut shifts = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let line = index + 2; // header is line 1
        let error = |message: String| roster_error("shift_roster", line, message);
        let person = user_service::find_user_by_username(db_pool, &row.username)
            .await?
            .ok_or_else(|| error(format!("unknown user '{}'", row.username)))?;
        shifts.push(NewShift {
            associated_person_id: person.id,
            start: parse_datetime(&row.start).map_err(error)?,
            duration_secs: parse_duration(&row.duration).map_err(error)?,
            location: row.location.clone(),
            kind: row.kind.parse::<ShiftKind>().map_err(error)?,
        });
    }
    insert_roster_shifts(db_pool, &shifts).await
}

/// SI shifts for exam reviews. Every row must name a member of the SIs group.
pub async fn import_exam_review_roster(db_pool: &SqlitePool, rows: &[ExamReviewRosterRow]) -> AppResult<usize> {
    let mut shifts = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        let error = |message: String| roster_error("exam_review_roster", line, message);
        let person = user_service::find_user_by_username(db_pool, &row.username)
            .await?
            .ok_or_else(|| error(format!("unknown user '{}'", row.username)))?;
        let groups = user_service::get_user_groups(db_pool, person.id).await?;
        if !groups.iter().any(|g| g == SIS) {
            return Err(error(format!("'{}' is not an SI leader", row.username)));
        }
        shifts.push(NewShift {
            associated_person_id: person.id,
            start: parse_datetime(&row.start).map_err(error)?,
            duration_secs: parse_duration(&row.duration).map_err(error)?,
            location: row.location.clone(),
            kind: ShiftKind::Si,
        });
    }
    insert_roster_shifts(db_pool, &shifts).await
}

// All or nothing
async fn insert_roster_shifts(db_pool: &SqlitePool, shifts: &[NewShift]) -> AppResult<usize> {
    let mut tx = db_pool.begin().await?;
    for shift in shifts {
        shift_service::insert_shift(&mut tx, shift).await?;
    }
    tx.commit().await?;
    Ok(shifts.len())
}

// --- Synthetic data ---

async fn create_superuser(db_pool: &SqlitePool, username: &str, password: &str) -> AppResult<usize> {
    if user_service::find_user_by_username(db_pool, username).await?.is_some() {
        tracing::warn!("Superuser '{}' already exists, leaving it alone", username);
        return Ok(0);
    }
    user_service::create_user(
        db_pool,
        &NewUser {
            username: username.to_string(),
            password: password.to_string(),
            is_superuser: true,
            ..Default::default()
        },
    )
    .await?;
    Ok(1)
}

async fn create_courses(db_pool: &SqlitePool, rng: &mut StdRng, count: usize) -> AppResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let department = DEPARTMENTS.choose(rng).copied().unwrap_or("MATH");
        let topic = TOPICS.choose(rng).copied().unwrap_or("Foundations");
        let data = CourseData {
            department: department.to_string(),
            number: rng.random_range(100..=999),
            name: format!("{} of {}", topic, department.to_lowercase()),
        };
        ids.push(course_service::create_course(db_pool, &data).await?);
    }
    Ok(ids)
}

// Roughly a third SI leaders, the rest tutors
fn synthetic_users(rng: &mut StdRng, count: usize, courses: &[i64]) -> Vec<NewUser> {
    (0..count)
        .map(|i| {
            let first_name = FIRST_NAMES.choose(rng).copied().unwrap_or("Alex");
            let last_name = LAST_NAMES.choose(rng).copied().unwrap_or("Smith");
            let username = format!("{}{}{}", first_name.to_lowercase(), last_name.to_lowercase(), i);
            let is_si = rng.random_bool(1.0 / 3.0);
            let mut user = NewUser {
                email: format!("{}@umass.edu", username),
                username,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password: DEFAULT_PASSWORD.to_string(),
                ..Default::default()
            };
            if is_si {
                user.si_course_id = courses.choose(rng).copied();
                user.groups.push(SIS.to_string());
            } else {
                let tutored = rng.random_range(1..=3).min(courses.len());
                user.courses_tutored = courses.choose_multiple(rng, tutored).copied().collect();
                user.groups.push(TUTORS.to_string());
            }
            user
        })
        .collect()
}

async fn create_shifts(
    db_pool: &SqlitePool,
    rng: &mut StdRng,
    count: usize,
    people: &[(i64, ShiftKind)],
) -> AppResult<Vec<(i64, i64)>> {
    let today = Local::now().date_naive();
    let mut created = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(&(person, kind)) = people.choose(rng) else {
            break;
        };
        let day = today + TimeDelta::days(rng.random_range(-7..=14));
        let time = NaiveTime::from_hms_opt(rng.random_range(8..=19), 0, 0).unwrap_or(NaiveTime::MIN);
        let shift = NewShift {
            associated_person_id: person,
            start: day.and_time(time),
            duration_secs: if rng.random_bool(0.5) { 3600 } else { 5400 },
            location: format!(
                "{} {}",
                LOCATIONS.choose(rng).copied().unwrap_or("ILC"),
                rng.random_range(1..=200)
            ),
            kind,
        };
        created.push((shift_service::create_shift(db_pool, &shift).await?, person));
    }
    Ok(created)
}

async fn create_hardware(db_pool: &SqlitePool, rng: &mut StdRng, count: usize) -> AppResult<usize> {
    let mut per_type: HashMap<&str, usize> = HashMap::new();
    for _ in 0..count {
        let hw_type = HARDWARE_TYPES.choose(rng).copied().unwrap_or("Laptop");
        let number = per_type.entry(hw_type).or_default();
        *number += 1;
        let data = HardwareData {
            name: format!("{} #{}", hw_type, number),
            is_available: rng.random_bool(0.5),
        };
        hardware_service::create_hardware(db_pool, &data).await?;
    }
    Ok(count)
}

// Half drops, half room changes, filed by the owner of a random shift
async fn create_change_requests(
    db_pool: &SqlitePool,
    rng: &mut StdRng,
    count: usize,
    shifts: &[(i64, i64)],
) -> AppResult<usize> {
    let mut created = 0;
    for _ in 0..count {
        let Some(&(shift_id, owner)) = shifts.choose(rng) else {
            break;
        };
        let caller = CurrentUser {
            id: owner,
            username: format!("user {}", owner),
            display_name: String::new(),
            is_superuser: false,
            groups: Vec::new(),
        };
        let is_drop = rng.random_bool(0.5);
        let proposed = if is_drop {
            ShiftFields::default()
        } else {
            ShiftFields {
                location: LOCATIONS.choose(rng).map(|l| format!("{} {}", l, rng.random_range(1..=200))),
                ..Default::default()
            }
        };
        let reason = if is_drop { "Cannot make it" } else { "Room change" };
        change_request_service::submit_change_request(db_pool, &caller, Some(shift_id), reason, proposed, is_drop)
            .await?;
        created += 1;
    }
    Ok(created)
}

/// Seeds the database. The same `seed` produces the same synthetic data.
pub async fn bootstrap(db_pool: &SqlitePool, options: &BootstrapOptions) -> AppResult<BootstrapReport> {
    let seed = options.seed.unwrap_or_else(rand::random);
    tracing::info!("🌱 Bootstrapping database (seed {})", seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = BootstrapReport::default();

    report.users += create_superuser(db_pool, &options.superuser_username, &options.superuser_password).await?;

    let courses = create_courses(db_pool, &mut rng, options.course_count).await?;
    report.courses += courses.len();

    let users = synthetic_users(&mut rng, options.user_count, &courses);
    let ids = user_service::create_users_in_bulk(db_pool, &users).await?;
    report.users += ids.len();
    let people: Vec<(i64, ShiftKind)> = ids
        .iter()
        .zip(&users)
        .map(|(id, user)| {
            let kind = if user.groups.iter().any(|g| g == SIS) {
                ShiftKind::Si
            } else {
                ShiftKind::Tutoring
            };
            (*id, kind)
        })
        .collect();

    if let Some(path) = &options.si_roster {
        let imported = import_si_roster(db_pool, &read_roster_file(path)?).await?;
        report.users += imported.users;
        report.courses += imported.courses;
    }
    if let Some(path) = &options.supervisor_roster {
        report.users += import_supervisor_roster(db_pool, &read_roster_file(path)?).await?;
    }

    let shifts = create_shifts(db_pool, &mut rng, options.shift_count, &people).await?;
    report.shifts += shifts.len();
    if let Some(path) = &options.shift_roster {
        report.shifts += import_shift_roster(db_pool, &read_roster_file(path)?).await?;
    }
    if let Some(path) = &options.exam_review_roster {
        report.shifts += import_exam_review_roster(db_pool, &read_roster_file(path)?).await?;
    }

    report.hardware = create_hardware(db_pool, &mut rng, options.hardware_count).await?;
    report.change_requests =
        create_change_requests(db_pool, &mut rng, options.change_request_count, &shifts).await?;

    tracing::info!("✅ Bootstrap finished: {:?}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::auth_service};

    fn options(seed: u64) -> BootstrapOptions {
        BootstrapOptions {
            superuser_username: "admin".into(),
            superuser_password: "admin".into(),
            user_count: 6,
            course_count: 3,
            shift_count: 10,
            hardware_count: 4,
            change_request_count: 3,
            seed: Some(seed),
            si_roster: None,
            supervisor_roster: None,
            shift_roster: None,
            exam_review_roster: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_the_requested_amounts() {
        let pool = test_pool().await;
        let report = bootstrap(&pool, &options(7)).await.unwrap();
        assert_eq!(
            report,
            BootstrapReport {
                users: 7,
                courses: 3,
                shifts: 10,
                hardware: 4,
                change_requests: 3,
            }
        );
        let admin = auth_service::authenticate(&pool, "admin", "admin").await.unwrap().unwrap();
        assert!(admin.is_superuser);
        assert_eq!(hardware_service::list_hardware(&pool).await.unwrap().len(), 4);
    }

    #[test]
    fn rosters_are_read_by_header() {
        let data = "username,first_name,last_name,email,department,number\n\
                    jdoe, Jane ,Doe,jdoe@umass.edu,COMPSCI,187\n";
        let rows: Vec<SiRosterRow> = read_roster(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first_name, "Jane");
        assert_eq!(rows[0].number, 187);

        let bad = "username,first_name\njdoe,Jane\n";
        assert!(read_roster::<SiRosterRow, _>(bad.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn rosters_create_people_courses_and_shifts() {
        let pool = test_pool().await;
        let sis: Vec<SiRosterRow> = read_roster(
            "username,first_name,last_name,email,department,number\n\
             jdoe,Jane,Doe,jdoe@umass.edu,COMPSCI,187\n\
             bsmith,Bo,Smith,bsmith@umass.edu,COMPSCI,187\n"
                .as_bytes(),
        )
        .unwrap();
        let report = import_si_roster(&pool, &sis).await.unwrap();
        assert_eq!(report.users, 2);
        assert_eq!(report.courses, 1);

        let shifts: Vec<ShiftRosterRow> = read_roster(
            "username,start,duration,location,kind\n\
             jdoe,2024-03-04 10:00,1:30:00,LGRT 121,SI\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(import_shift_roster(&pool, &shifts).await.unwrap(), 1);

        let unknown: Vec<ShiftRosterRow> = read_roster(
            "username,start,duration,location,kind\nnobody,2024-03-04 10:00,1:00:00,ILC,SI\n".as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            import_shift_roster(&pool, &unknown).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn exam_reviews_become_si_shifts_for_si_leaders() {
        let pool = test_pool().await;
        let sis: Vec<SiRosterRow> = read_roster(
            "username,first_name,last_name,email,department,number
             jdoe,Jane,Doe,jdoe@umass.edu,COMPSCI,187
"
                .as_bytes(),
        )
        .unwrap();
        import_si_roster(&pool, &sis).await.unwrap();

        let reviews: Vec<ExamReviewRosterRow> = read_roster(
            "username,start,duration,location
             jdoe,2024-04-10 18:00,2:00:00,ILC N151
"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(import_exam_review_roster(&pool, &reviews).await.unwrap(), 1);
        let (kind, duration): (ShiftKind, i64) =
            sqlx::query_as("SELECT kind, duration_secs FROM shifts")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(kind, ShiftKind::Si);
        assert_eq!(duration, 7200);

        create_superuser(&pool, "admin", "admin").await.unwrap();
        let not_si: Vec<ExamReviewRosterRow> = read_roster(
            "username,start,duration,location
admin,2024-04-11 18:00,1:00,ILC
".as_bytes(),
        )
        .unwrap();
        let err = import_exam_review_roster(&pool, &not_si).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.has("exam_review_roster")));
    }
}
