use chrono::{NaiveDate, Utc};

/// Source of the organization's canonical "today", independent of server
/// time zone. Template selection defaults its as-of date to this.
pub trait BusinessCalendar: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBusinessCalendar;

impl BusinessCalendar for SystemBusinessCalendar {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Pinned calendar for tests and backdated selection checks.
#[derive(Clone, Copy, Debug)]
pub struct FixedBusinessCalendar(pub NaiveDate);

impl BusinessCalendar for FixedBusinessCalendar {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
