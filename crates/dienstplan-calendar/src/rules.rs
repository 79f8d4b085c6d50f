use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};
use dienstplan_core::config::CalendarConfig;
use tracing::debug;

use crate::error::{CalendarError, Result};
use crate::types::{
    parse_date, parse_weekday, BlockReason, ConcreteSlot, TimeRange, WeeklySlotTemplate,
};

/// Longest span, in days, that [`CalendarRules::slots_between`] will enumerate.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Concrete date of `weekday` in the week starting at `week_start`.
///
/// `week_start` is normalised to its Monday first, so passing any day of the
/// week gives the same answer.
pub fn slot_date(week_start_date: NaiveDate, weekday: Weekday) -> NaiveDate {
    week_start(week_start_date) + Duration::days(weekday.num_days_from_monday() as i64)
}

/// `from + days`, saturating at the last representable date.
pub fn horizon_end(from: NaiveDate, days: u32) -> NaiveDate {
    from.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Holiday table, seasonal pause and the recurring slot set.
///
/// Pure and deterministic: every answer depends only on the configured tables
/// and the date passed in.
#[derive(Debug, Clone)]
pub struct CalendarRules {
    templates: Vec<WeeklySlotTemplate>,
    /// Keyed by year so "is this year configured at all" is a cheap lookup.
    holidays: BTreeMap<i32, BTreeSet<NaiveDate>>,
    summer_from: u32,
    summer_to: u32,
}

impl CalendarRules {
    pub fn new(
        templates: Vec<WeeklySlotTemplate>,
        holidays: impl IntoIterator<Item = NaiveDate>,
        summer_pause_months: (u32, u32),
    ) -> Result<Self> {
        let (summer_from, summer_to) = summer_pause_months;
        if !(1..=12).contains(&summer_from) || !(1..=12).contains(&summer_to) {
            return Err(CalendarError::Config(format!(
                "summer pause months out of range: {summer_from}..{summer_to}"
            )));
        }
        if summer_from > summer_to {
            return Err(CalendarError::Config(format!(
                "summer pause must not wrap the year end: {summer_from}..{summer_to}"
            )));
        }

        let mut seen = HashSet::new();
        for t in &templates {
            if !seen.insert(t.id) {
                return Err(CalendarError::Config(format!(
                    "duplicate slot template id {}",
                    t.id
                )));
            }
        }

        let mut by_year: BTreeMap<i32, BTreeSet<NaiveDate>> = BTreeMap::new();
        for d in holidays {
            by_year.entry(d.year()).or_default().insert(d);
        }

        Ok(Self {
            templates,
            holidays: by_year,
            summer_from,
            summer_to,
        })
    }

    /// Build rules from the `[calendar]` config section.
    ///
    /// Fails fast on unknown weekday names, malformed times or dates.
    pub fn from_config(cfg: &CalendarConfig) -> Result<Self> {
        let templates = cfg
            .slots
            .iter()
            .map(|s| {
                Ok(WeeklySlotTemplate {
                    id: s.id,
                    weekday: parse_weekday(&s.weekday)?,
                    label: s.label.clone(),
                    time: TimeRange::from_parts(&s.start, &s.end)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let holidays = cfg
            .holidays
            .iter()
            .map(|d| parse_date(d))
            .collect::<Result<Vec<_>>>()?;

        let rules = Self::new(
            templates,
            holidays,
            (cfg.summer_pause_from_month, cfg.summer_pause_to_month),
        )?;
        debug!(
            templates = rules.templates.len(),
            years = ?rules.covered_years(),
            "calendar rules loaded"
        );
        Ok(rules)
    }

    pub fn templates(&self) -> &[WeeklySlotTemplate] {
        &self.templates
    }

    /// Years that have a holiday table. Dates in other years are never holidays.
    pub fn covered_years(&self) -> Vec<i32> {
        self.holidays.keys().copied().collect()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays
            .get(&date.year())
            .is_some_and(|days| days.contains(&date))
    }

    pub fn is_summer_pause(&self, date: NaiveDate) -> bool {
        (self.summer_from..=self.summer_to).contains(&date.month())
    }

    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.is_holiday(date) || self.is_summer_pause(date)
    }

    pub fn block_reason(&self, date: NaiveDate) -> Option<BlockReason> {
        if self.is_holiday(date) {
            Some(BlockReason::Holiday)
        } else if self.is_summer_pause(date) {
            Some(BlockReason::SummerPause)
        } else {
            None
        }
    }

    /// One ConcreteSlot per template, in template order, for the given week.
    pub fn enumerate_concrete_slots(
        &self,
        week_start_date: NaiveDate,
        templates: &[WeeklySlotTemplate],
    ) -> Vec<ConcreteSlot> {
        templates
            .iter()
            .map(|t| self.instantiate(t, slot_date(week_start_date, t.weekday)))
            .collect()
    }

    /// [`Self::enumerate_concrete_slots`] over the configured template set.
    pub fn enumerate_week(&self, week_start_date: NaiveDate) -> Vec<ConcreteSlot> {
        self.enumerate_concrete_slots(week_start_date, &self.templates)
    }

    /// Every ConcreteSlot with `from <= date < until`, chronological.
    ///
    /// `until` is capped at [`MAX_HORIZON_DAYS`] after `from`.
    pub fn slots_between(&self, from: NaiveDate, until: NaiveDate) -> Vec<ConcreteSlot> {
        let until = until.min(horizon_end(from, MAX_HORIZON_DAYS));
        let mut slots = Vec::new();
        let mut week = week_start(from);
        while week < until {
            // The last representable week is skipped rather than overflowed.
            let Some(next) = week.checked_add_days(Days::new(7)) else {
                break;
            };
            slots.extend(
                self.enumerate_week(week)
                    .into_iter()
                    .filter(|s| s.date >= from && s.date < until),
            );
            week = next;
        }
        slots.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        slots
    }

    /// The template a booking for `time` on `date` refers to, if any.
    pub fn template_for(&self, date: NaiveDate, time: TimeRange) -> Option<&WeeklySlotTemplate> {
        self.templates
            .iter()
            .find(|t| t.weekday == date.weekday() && t.time == time)
    }

    /// The ConcreteSlot for a booking request; `None` when no template matches.
    pub fn concrete_slot(&self, date: NaiveDate, time: TimeRange) -> Option<ConcreteSlot> {
        self.template_for(date, time)
            .map(|t| self.instantiate(t, date))
    }

    fn instantiate(&self, template: &WeeklySlotTemplate, date: NaiveDate) -> ConcreteSlot {
        let block_reason = self.block_reason(date);
        ConcreteSlot {
            template_id: template.id,
            label: template.label.clone(),
            date,
            time: template.time,
            blocked: block_reason.is_some(),
            block_reason,
        }
    }
}
