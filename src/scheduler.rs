use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use chrono_tz::Tz;

use crate::db::Repository;
use crate::digest::DigestRunner;
use crate::models::{Batch, ScheduleTimes};

pub const TIMEZONE: Tz = chrono_tz::Asia::Seoul;

/// Fires the morning and evening digests at their configured local
/// times. Times are re-read from settings before every sleep, so
/// schedule updates take effect without a restart.
pub struct Scheduler {
    runner: DigestRunner,
    repo: Repository,
}

impl Scheduler {
    pub fn new(runner: DigestRunner, repo: Repository) -> Self {
        Self { runner, repo }
    }

    pub async fn run(self) -> crate::error::Result<()> {
        loop {
            let times = self.repo.schedule_times().await.unwrap_or_else(|e| {
                tracing::error!("failed to read schedule settings, using defaults: {e}");
                ScheduleTimes::default()
            });

            let now = Utc::now().with_timezone(&TIMEZONE);
            let (batch, at) = next_run(now, times);
            tracing::info!("next {batch} digest scheduled at {}", at.format("%Y-%m-%d %H:%M %Z"));

            let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            if let Err(e) = self.runner.run(batch).await {
                tracing::error!("{batch} digest failed: {e}");
            }
        }
    }
}

/// Earliest upcoming morning/evening occurrence strictly after `now`,
/// checking today and tomorrow.
pub fn next_run(now: DateTime<Tz>, times: ScheduleTimes) -> (Batch, DateTime<Tz>) {
    let slots = [(Batch::Morning, times.morning), (Batch::Evening, times.evening)];

    let mut best: Option<(Batch, DateTime<Tz>)> = None;
    for day_offset in 0..2u64 {
        let day = now.date_naive() + Days::new(day_offset);
        for (batch, time) in slots {
            let Some(at) = day.and_time(time).and_local_timezone(TIMEZONE).earliest() else {
                continue;
            };
            if at <= now {
                continue;
            }
            if best.map_or(true, |(_, current)| at < current) {
                best = Some((batch, at));
            }
        }
    }

    // tomorrow's slots are always in the future, so this is reachable
    // only if both times vanish into a zone transition two days running
    best.unwrap_or((
        Batch::Morning,
        now + chrono::Duration::days(1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn schedule_time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        TIMEZONE.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn before_morning_picks_todays_morning() {
        let (batch, when) = next_run(at(2026, 3, 2, 6, 30), ScheduleTimes::default());
        assert_eq!(batch, Batch::Morning);
        assert_eq!(when, at(2026, 3, 2, 8, 0));
    }

    #[test]
    fn between_slots_picks_todays_evening() {
        let (batch, when) = next_run(at(2026, 3, 2, 12, 0), ScheduleTimes::default());
        assert_eq!(batch, Batch::Evening);
        assert_eq!(when, at(2026, 3, 2, 20, 0));
    }

    #[test]
    fn after_evening_rolls_to_tomorrows_morning() {
        let (batch, when) = next_run(at(2026, 3, 2, 22, 0), ScheduleTimes::default());
        assert_eq!(batch, Batch::Morning);
        assert_eq!(when, at(2026, 3, 3, 8, 0));
    }

    #[test]
    fn exact_slot_time_moves_to_the_next_slot() {
        let (batch, when) = next_run(at(2026, 3, 2, 8, 0), ScheduleTimes::default());
        assert_eq!(batch, Batch::Evening);
        assert_eq!(when, at(2026, 3, 2, 20, 0));
    }

    #[test]
    fn custom_times_are_honored() {
        let times = ScheduleTimes {
            morning: schedule_time(7, 30),
            evening: schedule_time(21, 15),
        };
        let (batch, when) = next_run(at(2026, 3, 2, 21, 0), times);
        assert_eq!(batch, Batch::Evening);
        assert_eq!(when, at(2026, 3, 2, 21, 15));
    }
}
