//! Schedule table.
//!
//! Holds recurring triggers and yields the ones that are due each time the
//! control loop polls it.  The table knows nothing about the trigger queue
//! or the servo; it only returns [`DueEntry`] values.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ScheduleTable                            │
//! │                                                              │
//! │  ┌────────────────┐  ┌────────────────┐  ┌───────────────┐   │
//! │  │ Daily 08:00    │  │ Daily 20:00    │  │ Every 1h      │   │
//! │  │ Feed 5s        │  │ Feed 5s        │  │ ReportStatus  │   │
//! │  └───────┬────────┘  └───────┬────────┘  └───────┬───────┘   │
//! │          └────────── due_entries(now) ───────────┘           │
//! │                           │  (registration order)            │
//! │                           ▼                                  │
//! │                    FeederCore trigger queue                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Daily entries fire at most once per calendar day: a last-fired date is
//! kept per entry, so any number of polls inside the matching minute yield
//! one fire.  A daily time that was skipped between two polls (e.g. the
//! loop was stalled across it, even across midnight) still fires once on
//! the next poll.
//! Interval entries fire once per period, measured from table creation or
//! from their last fire.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use log::info;

use crate::config::FeederConfig;
use crate::events::TriggerAction;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// When an entry fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTrigger {
    /// Every day at the given local wall-clock minute.
    Daily { at: NaiveTime },
    /// Every `every`, measured on the monotonic clock.
    Interval { every: Duration },
}

/// A single schedule definition.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// Human-readable label (e.g. "daily-feed").
    pub label: &'static str,
    pub trigger: ScheduleTrigger,
    pub action: TriggerAction,
    pub enabled: bool,
}

impl ScheduleEntry {
    pub fn daily(label: &'static str, at: NaiveTime, action: TriggerAction) -> Self {
        Self {
            label,
            trigger: ScheduleTrigger::Daily { at: truncate_to_minute(at) },
            action,
            enabled: true,
        }
    }

    pub fn every(label: &'static str, every: Duration, action: TriggerAction) -> Self {
        Self {
            label,
            trigger: ScheduleTrigger::Interval { every },
            action,
            enabled: true,
        }
    }
}

/// Stable handle returned by [`ScheduleTable::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleId(u32);

/// An entry that is due now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueEntry {
    pub id: ScheduleId,
    pub label: &'static str,
    pub action: TriggerAction,
}

/// Internal bookkeeping for a live entry.
#[derive(Debug, Clone)]
struct Slot {
    id: ScheduleId,
    entry: ScheduleEntry,
    /// Daily: the calendar day it last fired.
    last_fired_day: Option<NaiveDate>,
    /// Interval: uptime of the last fire (or of registration).
    last_fired_at: Duration,
}

// ═══════════════════════════════════════════════════════════════
//  Schedule table
// ═══════════════════════════════════════════════════════════════

pub struct ScheduleTable {
    /// Registration order.
    slots: Vec<Slot>,
    next_id: u32,
    /// Local time of the previous poll.
    last_check: Option<NaiveDateTime>,
    /// Uptime at creation; interval entries added later start from here.
    origin: Duration,
}

impl ScheduleTable {
    /// Empty table whose interval entries count from `origin` uptime.
    pub fn new(origin: Duration) -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
            last_check: None,
            origin,
        }
    }

    /// The default table: one daily feed per configured time plus the
    /// periodic status report.
    pub fn from_config(config: &FeederConfig, origin: Duration) -> Self {
        let mut table = Self::new(origin);
        for at in &config.feed_times {
            table.add(ScheduleEntry::daily(
                "daily-feed",
                *at,
                TriggerAction::Feed { duration: config.feed_duration() },
            ));
        }
        table.add(ScheduleEntry::every(
            "status-report",
            config.status_interval(),
            TriggerAction::ReportStatus,
        ));
        table
    }

    /// Register an entry.  It is polled after every entry added before it.
    pub fn add(&mut self, entry: ScheduleEntry) -> ScheduleId {
        let id = ScheduleId(self.next_id);
        self.next_id += 1;
        match entry.trigger {
            ScheduleTrigger::Daily { at } => {
                info!("Schedule: added '{}' daily at {}", entry.label, at.format("%H:%M"));
            }
            ScheduleTrigger::Interval { every } => {
                info!("Schedule: added '{}' every {}s", entry.label, every.as_secs());
            }
        }
        self.slots.push(Slot {
            id,
            entry,
            last_fired_day: None,
            last_fired_at: self.origin,
        });
        id
    }

    /// Remove an entry.  Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: ScheduleId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        let removed = self.slots.len() != before;
        if removed {
            info!("Schedule: removed entry {:?}", id);
        }
        removed
    }

    /// Enable or disable one entry.  Returns `false` if the id is unknown.
    pub fn set_enabled(&mut self, id: ScheduleId, enabled: bool) -> bool {
        match self.slots.iter_mut().find(|s| s.id == id) {
            Some(slot) => {
                slot.entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of enabled entries.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.enabled).count()
    }

    /// Every entry due since the previous poll, in registration order.
    ///
    /// * `local_now`: local wall-clock time, drives daily entries.
    /// * `uptime`: monotonic time, drives interval entries.
    pub fn due_entries(&mut self, local_now: NaiveDateTime, uptime: Duration) -> Vec<DueEntry> {
        let last_check = self.last_check.replace(local_now);
        let mut due = Vec::new();

        for slot in &mut self.slots {
            if !slot.entry.enabled {
                continue;
            }

            let fire = match slot.entry.trigger {
                ScheduleTrigger::Daily { at } => {
                    let today = local_now.date();
                    // A stall across midnight can skip yesterday's time.
                    let mut missed = None;
                    for day in [today.pred_opt(), Some(today)].into_iter().flatten() {
                        let scheduled = day.and_time(at);
                        let in_window = scheduled <= local_now
                            && match last_check {
                                // Skipped past it since the last poll?
                                Some(prev) => {
                                    scheduled > prev || same_minute(scheduled, local_now)
                                }
                                // First poll: only inside the matching minute.
                                None => same_minute(scheduled, local_now),
                            };
                        if in_window && slot.last_fired_day.is_none_or(|d| d < day) {
                            missed = Some(day);
                        }
                    }
                    // At most one fire per poll, credited to the latest day.
                    match missed {
                        Some(day) => {
                            slot.last_fired_day = Some(day);
                            true
                        }
                        None => false,
                    }
                }
                ScheduleTrigger::Interval { every } => {
                    if uptime.saturating_sub(slot.last_fired_at) >= every {
                        slot.last_fired_at = uptime;
                        true
                    } else {
                        false
                    }
                }
            };

            if fire {
                info!("Schedule: '{}' due", slot.entry.label);
                due.push(DueEntry {
                    id: slot.id,
                    label: slot.entry.label,
                    action: slot.entry.action,
                });
            }
        }

        due
    }
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

fn same_minute(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date() && a.hour() == b.hour() && a.minute() == b.minute()
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
