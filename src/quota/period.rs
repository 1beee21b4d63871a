// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Period boundary arithmetic

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::types::{PeriodKind, PeriodWindow};

impl PeriodKind {
    /// The window a fresh record opened at `now` should cover
    pub fn window_starting(&self, now: DateTime<Utc>) -> PeriodWindow {
        match *self {
            PeriodKind::CalendarMonth => {
                let start = month_start(now.year(), now.month());
                let (y, m) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                PeriodWindow {
                    start,
                    end: month_start(y, m),
                }
            }
            PeriodKind::CalendarDay => {
                let start = midnight(now.date_naive());
                PeriodWindow {
                    start,
                    end: start + Duration::days(1),
                }
            }
            PeriodKind::Rolling { seconds } => PeriodWindow {
                start: now,
                end: now + Duration::seconds(seconds.max(1) as i64),
            },
        }
    }
}

/// UTC midnight at the start of the day following `now`
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    midnight(now.date_naive()) + Duration::days(1)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(midnight)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
