use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::sync::Mutex;

pub use mockable::{Clock, DefaultClock};

/// Calendar day in UTC; day windows and history cut-offs are computed from it.
pub trait ClockExt {
    fn today(&self) -> NaiveDate;
}

impl<C: Clock + ?Sized> ClockExt for C {
    fn today(&self) -> NaiveDate {
        self.utc().date_naive()
    }
}

/// Clock that only moves when told to. Used to simulate elapsed lockout windows.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
