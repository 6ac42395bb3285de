// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Collection of clock implementations.
//!
//! Code that needs to know the current time should receive a `Clock` as an injected dependency
//! instead of querying the system directly so that tests can control the passage of time.

use time::OffsetDateTime;

/// Generic definition of a clock.
pub trait Clock {
    /// Returns the current UTC time.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Clock implementation that uses the system clock.
#[derive(Clone, Default)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Test utilities.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::{Date, Month, Time};

    /// Builds a UTC timestamp from its components, which must be valid.
    pub fn utc_datetime(
        year: i32,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> OffsetDateTime {
        let month = Month::try_from(month).expect("Hardcoded month must be valid");
        let date =
            Date::from_calendar_date(year, month, day).expect("Hardcoded date must be valid");
        let time = Time::from_hms(hour, minute, second).expect("Hardcoded time must be valid");
        date.with_time(time).assume_utc()
    }

    /// A clock that returns a preconfigured instant and that can be modified at will.
    pub struct SettableClock {
        /// Current fake time.
        now: Mutex<OffsetDateTime>,
    }

    impl SettableClock {
        /// Creates a new clock that returns `now` until reconfigured with `set` or `advance`.
        pub fn new(now: OffsetDateTime) -> Self {
            Self { now: Mutex::new(now) }
        }

        /// Sets the new value of `now` that the clock returns.
        pub fn set(&self, now: OffsetDateTime) {
            *self.now.lock().unwrap() = now;
        }

        /// Advances the current time by `delta`.
        pub fn advance(&self, delta: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += delta;
        }
    }

    impl Clock for SettableClock {
        fn now_utc(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use time::macros::datetime;

        #[test]
        fn test_utc_datetime() {
            assert_eq!(datetime!(2023-12-01 10:15:30 UTC), utc_datetime(2023, 12, 1, 10, 15, 30));
        }

        #[test]
        fn test_settableclock_set_and_advance() {
            let clock = SettableClock::new(datetime!(2023-12-01 10:15:00 UTC));
            assert_eq!(datetime!(2023-12-01 10:15:00 UTC), clock.now_utc());
            assert_eq!(datetime!(2023-12-01 10:15:00 UTC), clock.now_utc());

            clock.set(datetime!(2024-01-02 03:04:05 UTC));
            assert_eq!(datetime!(2024-01-02 03:04:05 UTC), clock.now_utc());

            clock.advance(Duration::from_millis(1500));
            assert_eq!(datetime!(2024-01-02 03:04:06.5 UTC), clock.now_utc());
        }
    }
}
