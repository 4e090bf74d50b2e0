use crate::errors::{AppError, AppResult};
use crate::models::{DailyReport, Thresholds};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TREND_DAYS: i64 = 7;
pub const FULL_ATTENDANCE_DAYS: usize = 20;

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub today: String,
    pub today_count: usize,
    pub team_size: usize,
    pub submission_rate: u32,
    pub trend: Vec<TrendPoint>,
}

/// Today's headline numbers plus a seven point trend ending on `today`. Only the trend honours the
/// group scope; the headline count covers the whole team.
pub fn dashboard(reports: &[DailyReport], today: NaiveDate, team_size: usize, group_id: Option<&str>) -> DashboardStats {
    let today_str = format_date(today);
    let today_count = reports.iter().filter(|report| report.date == today_str).count();

    DashboardStats {
        today: today_str,
        today_count,
        team_size,
        submission_rate: submission_rate(today_count, team_size),
        trend: trend(reports, today, group_id),
    }
}

pub fn submission_rate(submitted: usize, team_size: usize) -> u32 {
    if team_size == 0 {
        return 0;
    }
    (submitted as f64 / team_size as f64 * 100.0).round() as u32
}

pub fn trend(reports: &[DailyReport], today: NaiveDate, group_id: Option<&str>) -> Vec<TrendPoint> {
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let date = format_date(today - Duration::days(offset));
            let count = reports
                .iter()
                .filter(|report| group_id.is_none() || report.group_id.as_deref() == group_id)
                .filter(|report| report.date == date)
                .count();
            TrendPoint {
                label: date[5..].to_string(),
                date,
                count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Intensity {
    None,
    Low,
    Medium,
    High,
    Peak,
}

impl Intensity {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => Self::None,
            1..=3 => Self::Low,
            4..=6 => Self::Medium,
            7 => Self::High,
            _ => Self::Peak,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub day: u32,
    pub date: String,
    pub count: usize,
    pub intensity: Intensity,
    pub meets_threshold: bool,
    pub report_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub leading_blanks: usize,
    pub days: Vec<CalendarDay>,
    pub submitted_days: usize,
    pub work_item_total: usize,
}

impl CalendarMonth {
    /// Grid cells in display order, `None` for the blanks before the first weekday.
    pub fn cells(&self) -> Vec<Option<&CalendarDay>> {
        std::iter::repeat(None)
            .take(self.leading_blanks)
            .chain(self.days.iter().map(Some))
            .collect()
    }

    pub fn series(&self) -> Vec<ChartPoint> {
        self.days
            .iter()
            .map(|day| ChartPoint {
                day: day.day,
                count: day.count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub day: u32,
    pub count: usize,
}

pub fn month_reports<'a>(reports: &'a [DailyReport], member_id: &str, year: i32, month: u32) -> Vec<&'a DailyReport> {
    reports
        .iter()
        .filter(|report| report.user_id == member_id)
        .filter(|report| {
            parse_date(&report.date)
                .map(|date| date.year() == year && date.month() == month)
                .unwrap_or(false)
        })
        .collect()
}

/// Heatmap for one member and month. When a member filed twice on one day the first report in
/// feed order (the newest) stands for that day.
pub fn calendar(
    reports: &[DailyReport],
    member_id: &str,
    year: i32,
    month: u32,
    thresholds: &Thresholds,
) -> AppResult<CalendarMonth> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("invalid month {}-{}", year, month)))?;
    let monthly = month_reports(reports, member_id, year, month);
    let daily_threshold = thresholds.daily as usize;

    let days = (1..=days_in_month(first))
        .map(|day| {
            let date = format!("{:04}-{:02}-{:02}", year, month, day);
            let report = monthly.iter().find(|report| report.date == date);
            let count = report.map(|report| report.work_count()).unwrap_or(0);
            CalendarDay {
                day,
                count,
                intensity: Intensity::from_count(count),
                meets_threshold: report.is_some() && count >= daily_threshold,
                report_id: report.map(|report| report.id.clone()),
                date,
            }
        })
        .collect::<Vec<_>>();

    let submitted_days = days.iter().filter(|day| day.report_id.is_some()).count();
    let work_item_total = days.iter().map(|day| day.count).sum();

    Ok(CalendarMonth {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday() as usize,
        days,
        submitted_days,
        work_item_total,
    })
}

fn days_in_month(first: NaiveDate) -> u32 {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next.and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Achievement {
    HighOutputDay,
    FullAttendance,
}

impl Achievement {
    pub fn label(self) -> &'static str {
        match self {
            Self::HighOutputDay => "单日爆肝",
            Self::FullAttendance => "全勤达人",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::HighOutputDay => "⚡",
            Self::FullAttendance => "🏅",
        }
    }
}

pub fn achievements(month: &CalendarMonth) -> Vec<Achievement> {
    let mut badges = Vec::new();
    if month.days.iter().any(|day| day.meets_threshold) {
        badges.push(Achievement::HighOutputDay);
    }
    if month.submitted_days >= FULL_ATTENDANCE_DAYS {
        badges.push(Achievement::FullAttendance);
    }
    badges
}

#[cfg(test)]
mod tests {
    use super::{achievements, calendar, dashboard, submission_rate, trend, Achievement, Intensity};
    use crate::models::{DailyReport, Mood, Thresholds, WorkItem};
    use chrono::{NaiveDate, Utc};

    fn report(id: &str, user_id: &str, date: &str, items: usize, group_id: Option<&str>) -> DailyReport {
        let work_items = (0..items)
            .map(|index| WorkItem::new(index as i64, format!("task {}", index), 100))
            .collect::<Vec<_>>();
        DailyReport {
            id: id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_id.to_uppercase(),
            group_id: group_id.map(ToString::to_string),
            group_name: String::new(),
            date: date.to_string(),
            today_work: work_items.iter().map(WorkItem::render).collect::<Vec<_>>().join("\n"),
            work_items: Some(work_items),
            problems: String::new(),
            tomorrow_plan: String::new(),
            mood: Mood::Neutral,
            likes: Default::default(),
            created_at: Utc::now(),
            created_at_millis: 0,
        }
    }

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn three_reports_today_on_team_of_four() {
        let reports = vec![
            report("1", "a", "2024-06-01", 1, None),
            report("2", "b", "2024-06-01", 1, None),
            report("3", "c", "2024-06-01", 1, None),
            report("4", "a", "2024-05-31", 1, None),
        ];
        let stats = dashboard(&reports, day("2024-06-01"), 4, None);
        assert_eq!(stats.today_count, 3);
        assert_eq!(stats.submission_rate, 75);

        let stats = dashboard(&reports, day("2024-06-01"), 7, None);
        assert_eq!(stats.submission_rate, 43);
        assert_eq!(submission_rate(3, 0), 0);
    }

    #[test]
    fn trend_always_has_seven_points_ending_today() {
        let points = trend(&[], day("2024-03-02"), None);
        assert_eq!(points.len(), 7);
        assert_eq!(points[0].date, "2024-02-25");
        assert_eq!(points[6].date, "2024-03-02");
        assert_eq!(points[6].label, "03-02");
        assert!(points.iter().all(|point| point.count == 0));
    }

    #[test]
    fn trend_respects_group_scope() {
        let reports = vec![
            report("1", "a", "2024-06-01", 1, Some("g1")),
            report("2", "b", "2024-06-01", 1, Some("g2")),
            report("3", "c", "2024-05-30", 1, Some("g1")),
        ];
        let all = trend(&reports, day("2024-06-01"), None);
        assert_eq!(all[6].count, 2);

        let scoped = trend(&reports, day("2024-06-01"), Some("g1"));
        assert_eq!(scoped[6].count, 1);
        assert_eq!(scoped[4].count, 1);
    }

    #[test]
    fn intensity_buckets() {
        assert_eq!(Intensity::from_count(0), Intensity::None);
        assert_eq!(Intensity::from_count(3), Intensity::Low);
        assert_eq!(Intensity::from_count(4), Intensity::Medium);
        assert_eq!(Intensity::from_count(6), Intensity::Medium);
        assert_eq!(Intensity::from_count(7), Intensity::High);
        assert_eq!(Intensity::from_count(8), Intensity::Peak);
        assert_eq!(Intensity::from_count(30), Intensity::Peak);
    }

    #[test]
    fn calendar_counts_submitted_days_and_totals() {
        let reports = vec![
            report("1", "a", "2024-06-03", 2, None),
            report("2", "a", "2024-06-04", 3, None),
            report("3", "a", "2024-06-10", 1, None),
            report("4", "a", "2024-06-18", 8, None),
            report("5", "a", "2024-06-30", 4, None),
            report("6", "b", "2024-06-05", 5, None),
            report("7", "a", "2024-07-01", 5, None),
        ];
        let month = calendar(&reports, "a", 2024, 6, &Thresholds::default()).expect("calendar");

        assert_eq!(month.days.len(), 30);
        assert_eq!(month.submitted_days, 5);
        assert_eq!(month.work_item_total, 18);
        assert_eq!(month.work_item_total, month.days.iter().map(|day| day.count).sum::<usize>());
        // 2024-06-01 is a Saturday.
        assert_eq!(month.leading_blanks, 6);
        assert_eq!(month.cells().len(), 36);
        assert!(month.cells()[5].is_none());
        assert_eq!(month.cells()[6].map(|day| day.day), Some(1));

        let peak = &month.days[17];
        assert_eq!(peak.intensity, Intensity::Peak);
        assert!(peak.meets_threshold);
        assert_eq!(month.series().len(), 30);
        assert_eq!(achievements(&month), vec![Achievement::HighOutputDay]);
    }

    #[test]
    fn full_attendance_needs_twenty_days() {
        let reports = (1..=20)
            .map(|day| report(&day.to_string(), "a", &format!("2024-01-{:02}", day), 1, None))
            .collect::<Vec<_>>();
        let month = calendar(&reports, "a", 2024, 1, &Thresholds::default()).expect("calendar");
        assert_eq!(achievements(&month), vec![Achievement::FullAttendance]);
        assert_eq!(month.leading_blanks, 1);

        let fewer = calendar(&reports[..19], "a", 2024, 1, &Thresholds::default()).expect("calendar");
        assert!(achievements(&fewer).is_empty());
    }

    #[test]
    fn legacy_reports_count_lines_and_invalid_months_are_rejected() {
        let mut legacy = report("1", "a", "2024-02-29", 0, None);
        legacy.work_items = None;
        legacy.today_work = "one\n\ntwo\n".to_string();
        let month = calendar(&[legacy], "a", 2024, 2, &Thresholds::default()).expect("calendar");
        assert_eq!(month.days.len(), 29);
        assert_eq!(month.days[28].count, 2);

        assert!(calendar(&[], "a", 2024, 13, &Thresholds::default()).is_err());
    }
}
