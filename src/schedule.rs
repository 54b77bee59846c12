use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weekly enumeration gives up after this many calendar slots. At one slot
/// per week this covers roughly two years of meetings.
pub const MAX_WEEKLY_SLOTS: usize = 100;

/// The daily topic binder walks at most this many calendar days.
pub const MAX_BINDER_DAYS: usize = 365;

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ScheduleError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: &str,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Day-of-week index in the 0 = Sunday .. 6 = Saturday convention used by
/// the stored class records and the wire protocol.
pub fn weekday_index(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

fn is_weekend(date: NaiveDate) -> bool {
    let wd = weekday_index(date);
    wd == 0 || wd == 6
}

/// Fixed table of public holidays for one scheduling run. The daemon loads
/// it from the `holidays` table; callers may swap in a different year's
/// dataset without touching the projector.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    by_date: HashMap<NaiveDate, String>,
}

impl HolidayCalendar {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, String)>,
    {
        Self {
            by_date: entries.into_iter().collect(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.by_date.contains_key(&date)
    }

    pub fn holiday_name(&self, date: NaiveDate) -> Option<&str> {
        self.by_date.get(&date).map(String::as_str)
    }

    /// Nearest holiday strictly after `date`, if any.
    pub fn next_holiday_after(&self, date: NaiveDate) -> Option<(NaiveDate, &str)> {
        self.by_date
            .iter()
            .filter(|(d, _)| **d > date)
            .min_by_key(|(d, _)| **d)
            .map(|(d, name)| (*d, name.as_str()))
    }
}

/// One projection run's inputs. `target_weekday` uses the 0 = Sunday
/// convention; `total_meetings == 0` is tolerated and yields empty output.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub start_date: NaiveDate,
    pub target_weekday: u32,
    pub total_meetings: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    pub is_holiday: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_no: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub progress: i64,
    pub meetings_passed: u32,
    pub total_meetings: u32,
}

/// Topic descriptor as returned by the content-generation collaborator.
/// Only `session_count` is sanitized here; topic text is passed through.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDescriptor {
    pub topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub session_count: Option<i64>,
}

impl TopicDescriptor {
    /// Session count with the documented default: absent or non-positive
    /// values mean a single session.
    pub fn sessions(&self) -> u32 {
        match self.session_count {
            Some(n) if n > 0 => n as u32,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumModule {
    pub day: u32,
    pub date: NaiveDate,
    pub topic: String,
    pub description: String,
    pub is_holiday: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday_name: Option<String>,
    pub duration: i64,
}

/// Smallest `date' >= date` with the requested weekday. Plain modular
/// arithmetic guarantees a hit within 7 days; the loop is bounded anyway.
pub fn advance_to_weekday(date: NaiveDate, target_weekday: u32) -> NaiveDate {
    let mut current = date;
    for _ in 0..7 {
        if weekday_index(current) == target_weekday {
            return current;
        }
        current = current + Duration::days(1);
    }
    unreachable!("weekday advance did not converge; target must be 0..=6")
}

/// Weekly teaching-day enumeration: one slot per week on the target
/// weekday. A holiday slot is emitted but consumes no meeting number, so
/// the schedule stretches by one week per collision.
pub fn enumerate_meetings(
    config: &ScheduleConfig,
    calendar: &HolidayCalendar,
) -> Result<Vec<ScheduleEntry>, ScheduleError> {
    if config.total_meetings == 0 {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut cursor = advance_to_weekday(config.start_date, config.target_weekday);
    let mut meeting_no: u32 = 0;

    for _ in 0..MAX_WEEKLY_SLOTS {
        if let Some(name) = calendar.holiday_name(cursor) {
            entries.push(ScheduleEntry {
                date: cursor,
                is_holiday: true,
                holiday_name: Some(name.to_string()),
                meeting_no: None,
            });
        } else {
            meeting_no += 1;
            entries.push(ScheduleEntry {
                date: cursor,
                is_holiday: false,
                holiday_name: None,
                meeting_no: Some(meeting_no),
            });
            if meeting_no == config.total_meetings {
                return Ok(entries);
            }
        }
        cursor = cursor + Duration::days(7);
    }

    Err(ScheduleError::with_details(
        "malformed_schedule",
        format!(
            "could not place {} meetings within {} weekly slots",
            config.total_meetings, MAX_WEEKLY_SLOTS
        ),
        serde_json::json!({
            "startDate": config.start_date.to_string(),
            "dayOfWeek": config.target_weekday,
            "meetingsPlaced": meeting_no,
        }),
    ))
}

/// Percentage of meetings whose date is on or before `today`. Comparison
/// is date-inclusive, so a meeting held today already counts as passed.
pub fn compute_progress(
    config: &ScheduleConfig,
    calendar: &HolidayCalendar,
    today: NaiveDate,
) -> Result<ProgressReport, ScheduleError> {
    if config.total_meetings == 0 {
        return Ok(ProgressReport {
            progress: 0,
            meetings_passed: 0,
            total_meetings: 0,
        });
    }
    let entries = enumerate_meetings(config, calendar)?;
    Ok(progress_from_entries(&entries, config.total_meetings, today))
}

/// Same derivation over a precomputed entry sequence.
pub fn progress_from_entries(
    entries: &[ScheduleEntry],
    total_meetings: u32,
    today: NaiveDate,
) -> ProgressReport {
    if total_meetings == 0 {
        return ProgressReport {
            progress: 0,
            meetings_passed: 0,
            total_meetings: 0,
        };
    }
    let meetings_passed = entries
        .iter()
        .filter(|e| !e.is_holiday && e.date <= today)
        .count() as u32;
    let raw = (f64::from(meetings_passed) / f64::from(total_meetings) * 100.0).round() as i64;
    ProgressReport {
        progress: raw.min(100),
        meetings_passed,
        total_meetings,
    }
}

/// Daily topic-to-calendar binding. Unlike `enumerate_meetings` this walks
/// every calendar day: holidays produce a module of their own, weekends are
/// skipped silently, and each Mon-Fri weekday consumes one session of the
/// current topic until the topic list is exhausted.
pub fn bind_topics_to_calendar(
    topics: &[TopicDescriptor],
    start_date: NaiveDate,
    calendar: &HolidayCalendar,
    default_duration: i64,
) -> Result<Vec<CurriculumModule>, ScheduleError> {
    let mut modules = Vec::new();
    let mut cursor = start_date;
    let mut topic_idx = 0usize;
    let mut session_no: u32 = 1;
    let mut day_counter: u32 = 1;

    for _ in 0..MAX_BINDER_DAYS {
        if topic_idx >= topics.len() {
            return Ok(modules);
        }

        if let Some(name) = calendar.holiday_name(cursor) {
            modules.push(CurriculumModule {
                day: 0,
                date: cursor,
                topic: format!("LIBUR NASIONAL: {name}"),
                description: "Tidak ada kegiatan belajar mengajar.".to_string(),
                is_holiday: true,
                holiday_name: Some(name.to_string()),
                duration: 0,
            });
        } else if is_weekend(cursor) {
            // no module for Saturday/Sunday
        } else {
            let topic = &topics[topic_idx];
            let total_sessions = topic.sessions();

            let (display_topic, display_desc) = if total_sessions > 1 {
                let phase = if session_no == 1 {
                    "(Pengenalan/Teori)"
                } else if session_no == total_sessions {
                    "(Finalisasi/Evaluasi)"
                } else {
                    "(Praktek/Lanjutan)"
                };
                (
                    format!("{} (Part {})", topic.topic, session_no),
                    format!("{} {}", topic.description, phase),
                )
            } else {
                (topic.topic.clone(), topic.description.clone())
            };

            modules.push(CurriculumModule {
                day: day_counter,
                date: cursor,
                topic: display_topic,
                description: display_desc,
                is_holiday: false,
                holiday_name: None,
                duration: default_duration,
            });

            if session_no < total_sessions {
                session_no += 1;
            } else {
                topic_idx += 1;
                session_no = 1;
            }
            day_counter += 1;
        }

        cursor = cursor + Duration::days(1);
    }

    if topic_idx >= topics.len() {
        return Ok(modules);
    }
    Err(ScheduleError::with_details(
        "malformed_schedule",
        format!(
            "topic list does not fit within {} calendar days",
            MAX_BINDER_DAYS
        ),
        serde_json::json!({
            "startDate": start_date.to_string(),
            "topicsBound": topic_idx,
            "topicsTotal": topics.len(),
        }),
    ))
}

/// Date of the Nth effective teaching day (Mon-Fri, non-holiday) counting
/// from `start_date` inclusive. Used for the generator's estimated end date.
pub fn estimate_end_date(
    start_date: NaiveDate,
    effective_days: u32,
    calendar: &HolidayCalendar,
) -> Result<NaiveDate, ScheduleError> {
    if effective_days == 0 {
        return Err(ScheduleError::new(
            "bad_params",
            "effectiveDays must be at least 1",
        ));
    }

    let mut counted: u32 = 0;
    let mut cursor = start_date;
    for _ in 0..MAX_BINDER_DAYS {
        if !calendar.is_holiday(cursor) && !is_weekend(cursor) {
            counted += 1;
            if counted == effective_days {
                return Ok(cursor);
            }
        }
        cursor = cursor + Duration::days(1);
    }

    Err(ScheduleError::with_details(
        "malformed_schedule",
        format!(
            "{} effective days do not fit within {} calendar days",
            effective_days, MAX_BINDER_DAYS
        ),
        serde_json::json!({
            "startDate": start_date.to_string(),
            "daysCounted": counted,
        }),
    ))
}

/// Pre-projection gate: rejects start dates in the past and start dates
/// on or after the nearest upcoming holiday (relative to `today`, not to
/// the start date). The projector itself never re-runs this check.
pub fn validate_start_date(
    start_date: NaiveDate,
    calendar: &HolidayCalendar,
    today: NaiveDate,
) -> Result<(), ScheduleError> {
    if start_date < today {
        return Err(ScheduleError::new(
            "start_date_past",
            "start date must not be in the past",
        ));
    }

    if let Some((holiday_date, holiday_name)) = calendar.next_holiday_after(today) {
        if start_date >= holiday_date {
            return Err(ScheduleError::with_details(
                "start_date_beyond_holiday",
                format!(
                    "start date must not pass the nearest holiday: {} ({})",
                    holiday_name, holiday_date
                ),
                serde_json::json!({
                    "holidayName": holiday_name,
                    "holidayDate": holiday_date.to_string(),
                }),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn calendar(entries: &[(&str, &str)]) -> HolidayCalendar {
        HolidayCalendar::new(
            entries
                .iter()
                .map(|(date, name)| (d(date), name.to_string())),
        )
    }

    fn config(start: &str, weekday: u32, meetings: u32) -> ScheduleConfig {
        ScheduleConfig {
            start_date: d(start),
            target_weekday: weekday,
            total_meetings: meetings,
        }
    }

    #[test]
    fn advance_reaches_requested_weekday() {
        // 2025-01-06 is a Monday.
        assert_eq!(advance_to_weekday(d("2025-01-06"), 1), d("2025-01-06"));
        assert_eq!(advance_to_weekday(d("2025-01-06"), 3), d("2025-01-08"));
        assert_eq!(advance_to_weekday(d("2025-01-06"), 0), d("2025-01-12"));
        assert_eq!(advance_to_weekday(d("2025-01-07"), 1), d("2025-01-13"));
    }

    #[test]
    fn enumerate_places_exact_meeting_count_on_target_weekday() {
        let cal = calendar(&[]);
        let entries = enumerate_meetings(&config("2025-01-06", 1, 3), &cal).unwrap();
        let dates: Vec<_> = entries.iter().map(|e| e.date.to_string()).collect();
        assert_eq!(dates, vec!["2025-01-06", "2025-01-13", "2025-01-20"]);
        for (i, e) in entries.iter().enumerate() {
            assert!(!e.is_holiday);
            assert_eq!(e.meeting_no, Some(i as u32 + 1));
            assert_eq!(weekday_index(e.date), 1);
        }
    }

    #[test]
    fn enumerate_entries_are_weekly_and_monotonic() {
        let cal = calendar(&[("2025-02-03", "Libur Uji")]);
        let entries = enumerate_meetings(&config("2025-01-06", 1, 8), &cal).unwrap();
        for pair in entries.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(7));
        }
    }

    #[test]
    fn holiday_slot_extends_span_without_meeting_number() {
        let cal = calendar(&[("2025-01-13", "Test Holiday")]);
        let entries = enumerate_meetings(&config("2025-01-06", 1, 3), &cal).unwrap();
        assert_eq!(entries.len(), 4);

        assert_eq!(entries[0].meeting_no, Some(1));
        assert!(entries[1].is_holiday);
        assert_eq!(entries[1].meeting_no, None);
        assert_eq!(entries[1].holiday_name.as_deref(), Some("Test Holiday"));
        assert_eq!(entries[2].meeting_no, Some(2));
        assert_eq!(entries[3].meeting_no, Some(3));
        // One collision pushes the final meeting exactly one week out.
        assert_eq!(entries[3].date, d("2025-01-27"));
    }

    #[test]
    fn enumerate_zero_meetings_is_empty() {
        let cal = calendar(&[]);
        let entries = enumerate_meetings(&config("2025-01-06", 1, 0), &cal).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn enumerate_fails_when_every_slot_is_a_holiday() {
        // Blanket every Monday for three years.
        let mut blocked = Vec::new();
        let mut cursor = d("2025-01-06");
        for _ in 0..160 {
            blocked.push((cursor, "Libur Permanen".to_string()));
            cursor = cursor + Duration::days(7);
        }
        let cal = HolidayCalendar::new(blocked);

        let err = enumerate_meetings(&config("2025-01-06", 1, 2), &cal).unwrap_err();
        assert_eq!(err.code, "malformed_schedule");
    }

    #[test]
    fn progress_counts_same_day_meeting_as_passed() {
        let cal = calendar(&[("2025-01-13", "Test Holiday")]);
        let cfg = config("2025-01-06", 1, 3);

        let report = compute_progress(&cfg, &cal, d("2025-01-15")).unwrap();
        assert_eq!(report.meetings_passed, 1);
        assert_eq!(report.progress, 33);

        // Inclusive comparison: the meeting on the 20th counts on the 20th.
        let report = compute_progress(&cfg, &cal, d("2025-01-20")).unwrap();
        assert_eq!(report.meetings_passed, 2);
        assert_eq!(report.progress, 67);
    }

    #[test]
    fn progress_clamps_to_bounds() {
        let cal = calendar(&[]);
        let cfg = config("2025-01-06", 1, 3);

        assert_eq!(compute_progress(&cfg, &cal, d("2024-12-01")).unwrap().progress, 0);
        let full = compute_progress(&cfg, &cal, d("2026-01-01")).unwrap();
        assert_eq!(full.progress, 100);
        assert_eq!(full.meetings_passed, 3);
    }

    #[test]
    fn progress_zero_meetings_is_zero() {
        let cal = calendar(&[]);
        let report = compute_progress(&config("2025-01-06", 1, 0), &cal, d("2025-06-01")).unwrap();
        assert_eq!(report.progress, 0);
        assert_eq!(report.total_meetings, 0);
    }

    fn topic(name: &str, desc: &str, sessions: Option<i64>) -> TopicDescriptor {
        TopicDescriptor {
            topic: name.to_string(),
            description: desc.to_string(),
            session_count: sessions,
        }
    }

    #[test]
    fn session_count_defaults_to_one_when_absent_or_non_positive() {
        assert_eq!(topic("A", "", None).sessions(), 1);
        assert_eq!(topic("A", "", Some(0)).sessions(), 1);
        assert_eq!(topic("A", "", Some(-2)).sessions(), 1);
        assert_eq!(topic("A", "", Some(3)).sessions(), 3);
    }

    #[test]
    fn binder_expands_multi_session_topic_across_weekdays() {
        let cal = calendar(&[]);
        let topics = vec![topic("Algebra", "Persamaan dasar", Some(2))];

        let modules = bind_topics_to_calendar(&topics, d("2025-01-06"), &cal, 2).unwrap();
        assert_eq!(modules.len(), 2);

        assert_eq!(modules[0].date, d("2025-01-06"));
        assert_eq!(modules[0].topic, "Algebra (Part 1)");
        assert_eq!(modules[0].description, "Persamaan dasar (Pengenalan/Teori)");
        assert_eq!(modules[0].day, 1);
        assert_eq!(modules[0].duration, 2);

        assert_eq!(modules[1].date, d("2025-01-07"));
        assert_eq!(modules[1].topic, "Algebra (Part 2)");
        assert_eq!(
            modules[1].description,
            "Persamaan dasar (Finalisasi/Evaluasi)"
        );
    }

    #[test]
    fn binder_marks_middle_sessions_as_practice() {
        let cal = calendar(&[]);
        let topics = vec![topic("Proyek", "Studi kasus", Some(3))];
        let modules = bind_topics_to_calendar(&topics, d("2025-01-06"), &cal, 2).unwrap();
        assert_eq!(modules.len(), 3);
        assert_eq!(modules[1].description, "Studi kasus (Praktek/Lanjutan)");
    }

    #[test]
    fn binder_skips_weekends_and_emits_holiday_modules() {
        let cal = calendar(&[("2025-01-07", "Libur Uji")]);
        let topics = vec![
            topic("Topik A", "a", None),
            topic("Topik B", "b", None),
        ];

        // Mon teaching, Tue holiday, Wed teaching.
        let modules = bind_topics_to_calendar(&topics, d("2025-01-06"), &cal, 2).unwrap();
        assert_eq!(modules.len(), 3);
        assert_eq!(modules[0].date, d("2025-01-06"));
        assert!(modules[1].is_holiday);
        assert_eq!(modules[1].day, 0);
        assert_eq!(modules[1].duration, 0);
        assert_eq!(modules[1].topic, "LIBUR NASIONAL: Libur Uji");
        assert_eq!(modules[2].date, d("2025-01-08"));
        assert_eq!(modules[2].topic, "Topik B");

        // A Friday start rolls over the weekend to Monday.
        let modules = bind_topics_to_calendar(&topics, d("2025-01-10"), &calendar(&[]), 2).unwrap();
        let dates: Vec<_> = modules.iter().map(|m| m.date.to_string()).collect();
        assert_eq!(dates, vec!["2025-01-10", "2025-01-13"]);
        assert!(modules.iter().all(|m| !is_weekend(m.date)));
    }

    #[test]
    fn binder_teaching_module_total_matches_session_counts() {
        let cal = calendar(&[("2025-01-29", "Tahun Baru Imlek")]);
        let topics = vec![
            topic("A", "", Some(3)),
            topic("B", "", None),
            topic("C", "", Some(2)),
        ];
        let modules = bind_topics_to_calendar(&topics, d("2025-01-06"), &cal, 2).unwrap();
        let teaching = modules.iter().filter(|m| !m.is_holiday).count();
        assert_eq!(teaching, 6);
        // Sequence numbers on teaching modules stay dense.
        let days: Vec<_> = modules
            .iter()
            .filter(|m| !m.is_holiday)
            .map(|m| m.day)
            .collect();
        assert_eq!(days, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn binder_fails_when_topics_outlast_the_projection_window() {
        let cal = calendar(&[]);
        let topics: Vec<_> = (0..MAX_BINDER_DAYS)
            .map(|i| topic(&format!("Topik {i}"), "", None))
            .collect();
        let err = bind_topics_to_calendar(&topics, d("2025-01-06"), &cal, 2).unwrap_err();
        assert_eq!(err.code, "malformed_schedule");
    }

    #[test]
    fn estimate_end_counts_only_effective_days() {
        let cal = calendar(&[]);
        assert_eq!(
            estimate_end_date(d("2025-01-06"), 5, &cal).unwrap(),
            d("2025-01-10")
        );
        // Sixth effective day lands after the weekend.
        assert_eq!(
            estimate_end_date(d("2025-01-06"), 6, &cal).unwrap(),
            d("2025-01-13")
        );
        // A holiday mid-week pushes the count by one day.
        let cal = calendar(&[("2025-01-08", "Libur Uji")]);
        assert_eq!(
            estimate_end_date(d("2025-01-06"), 5, &cal).unwrap(),
            d("2025-01-13")
        );
    }

    #[test]
    fn gate_rejects_past_start_date() {
        let cal = calendar(&[]);
        let err = validate_start_date(d("2025-05-10"), &cal, d("2025-05-20")).unwrap_err();
        assert_eq!(err.code, "start_date_past");
    }

    #[test]
    fn gate_rejects_start_on_or_after_next_holiday() {
        let cal = calendar(&[("2025-06-01", "Hari Lahir Pancasila")]);
        let today = d("2025-05-20");

        let err = validate_start_date(d("2025-06-01"), &cal, today).unwrap_err();
        assert_eq!(err.code, "start_date_beyond_holiday");
        assert!(err.message.contains("Hari Lahir Pancasila"));

        let err = validate_start_date(d("2025-06-10"), &cal, today).unwrap_err();
        assert_eq!(err.code, "start_date_beyond_holiday");

        assert!(validate_start_date(d("2025-05-25"), &cal, today).is_ok());
    }

    #[test]
    fn gate_measures_holiday_distance_from_today_not_start() {
        // The holiday is already behind `today`, so it cannot block anything.
        let cal = calendar(&[("2025-05-01", "Hari Buruh Internasional")]);
        assert!(validate_start_date(d("2025-06-10"), &cal, d("2025-05-20")).is_ok());
    }
}
