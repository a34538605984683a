// src/services/daily_status.rs
use crate::{
    models::{
        attendance::{DailyRecord, DayStatus, DeviceLog, Direction, PresencePolicy},
        calendar::AttendanceConfig,
        leave::RequestType,
    },
    services::{
        calendar_service::{is_holiday, HolidaySet},
        leave_index::LeaveIndex,
    },
};
use chrono::{Duration, NaiveDate, NaiveTime};

const fn time_of_day(hour: u32, min: u32, sec: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, min, sec) {
        Some(time) => time,
        None => panic!("invalid time of day"),
    }
}

const DAY_START: NaiveTime = time_of_day(9, 0, 0);
/// Check-outs before this time are early departures.
const DAY_END: NaiveTime = time_of_day(16, 30, 0);
const LAST_SECOND: NaiveTime = time_of_day(23, 59, 59);

/// `base + minutes`, saturating at the bounds of the day instead of wrapping
/// past midnight.
fn offset_within_day(base: NaiveTime, minutes: i64) -> NaiveTime {
    match base.overflowing_add_signed(Duration::minutes(minutes)) {
        (time, 0) => time,
        (_, overflow) if overflow > 0 => LAST_SECOND,
        _ => NaiveTime::MIN,
    }
}

pub fn grace_deadline(config: &AttendanceConfig) -> NaiveTime {
    offset_within_day(DAY_START, config.grace_minutes)
}

pub fn lockout_deadline(config: &AttendanceConfig) -> NaiveTime {
    offset_within_day(grace_deadline(config), config.lockout_minutes)
}

fn status_for_leave(kind: RequestType) -> DayStatus {
    match kind {
        RequestType::Od => DayStatus::Od,
        RequestType::Internship => DayStatus::Internship,
        RequestType::Permission => DayStatus::Permission,
        RequestType::Leave => DayStatus::Leave,
    }
}

/// Sum of (out - in) over adjacent in/out pairs, in hours, two decimals.
/// `logs` must be in time order.
pub fn working_hours(logs: &[&DeviceLog]) -> f64 {
    let seconds: i64 = logs
        .windows(2)
        .filter(|pair| pair[0].direction() == Some(Direction::In) && pair[1].direction() == Some(Direction::Out))
        .map(|pair| (pair[1].log_date - pair[0].log_date).num_seconds().max(0))
        .sum();
    (seconds as f64 / 3600.0 * 100.0).round() / 100.0
}

/// Everything the resolver needs that is shared across people and days.
pub struct ResolverContext<'a> {
    pub holidays: &'a HolidaySet,
    pub leaves: &'a LeaveIndex,
    pub config: &'a AttendanceConfig,
    pub policy: PresencePolicy,
}

/// Resolves one person's status on one day. `day_logs` are that person's logs for
/// `date`, in any order.
pub fn resolve_day(
    ctx: &ResolverContext<'_>,
    sin_number: &str,
    date: NaiveDate,
    day_logs: &[&DeviceLog],
) -> DailyRecord {
    let mut record = DailyRecord {
        date,
        status: DayStatus::Absent,
        check_in: None,
        check_out: None,
        working_hours: 0.0,
    };

    if is_holiday(date, ctx.holidays) {
        record.status = DayStatus::Holiday;
        return record;
    }

    if let Some(leave) = ctx.leaves.find_covering_leave(sin_number, date) {
        record.status = status_for_leave(leave.request_type);
        return record;
    }

    let mut logs: Vec<&DeviceLog> = day_logs.iter().copied().filter(|l| l.date() == date).collect();
    logs.sort_by_key(|l| l.log_date);

    let check_in = logs.iter().find(|l| l.direction() == Some(Direction::In));
    let check_out = logs.iter().rev().find(|l| l.direction() == Some(Direction::Out));
    record.check_in = check_in.map(|l| l.time());
    record.check_out = check_out.map(|l| l.time());
    record.working_hours = working_hours(&logs);

    let Some(check_in) = record.check_in else {
        return record;
    };

    record.status = if check_in > lockout_deadline(ctx.config) {
        DayStatus::Absent
    } else if check_in > grace_deadline(ctx.config) {
        DayStatus::Late
    } else {
        match record.check_out {
            Some(out) if out < DAY_END => DayStatus::EarlyDeparture,
            Some(_) => DayStatus::Present,
            None => match ctx.policy {
                PresencePolicy::Strict => DayStatus::Absent,
                PresencePolicy::CheckInOnly => DayStatus::Present,
            },
        }
    };
    record
}
