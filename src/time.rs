// Wall clock used for result timestamps

pub trait Clock {
    fn unix_millis() -> i64;
    fn rfc3339() -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_millis() -> i64 {
        #[cfg(miri)]
        {
            0
        }
        #[cfg(not(miri))]
        {
            chrono::Utc::now().timestamp_millis()
        }
    }

    fn rfc3339() -> String {
        #[cfg(miri)]
        {
            "1970-01-01T00:00:00+00:00".to_string()
        }
        #[cfg(not(miri))]
        {
            chrono::Utc::now().to_rfc3339()
        }
    }
}

pub fn now_unix_millis() -> i64 {
    SystemClock::unix_millis()
}

pub fn now_rfc3339() -> String {
    SystemClock::rfc3339()
}
