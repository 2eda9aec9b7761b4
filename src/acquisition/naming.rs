//! Output file naming.

use chrono::{Local, NaiveDate};

/// Names frames `{YYYY-MM-DD}_{index}.png`.
///
/// The date is fixed when the namer is created, so a run that crosses
/// midnight keeps one prefix. Names are not unique across runs on the same
/// day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNamer {
    date_stamp: String,
}

impl FrameNamer {
    /// Uses today's local date.
    pub fn today() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    /// Stamps files with `date` as `YYYY-MM-DD`.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date_stamp: date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Uses a caller-supplied stamp verbatim.
    pub fn with_stamp(stamp: impl Into<String>) -> Self {
        Self {
            date_stamp: stamp.into(),
        }
    }

    /// Stamp prefixed to every file name.
    pub fn date_stamp(&self) -> &str {
        &self.date_stamp
    }

    /// File name for the frame at `index`.
    pub fn name(&self, index: u32) -> String {
        format!("{}_{}.png", self.date_stamp, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_pattern() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let namer = FrameNamer::for_date(date);

        assert_eq!(namer.date_stamp(), "2024-03-07");
        assert_eq!(namer.name(0), "2024-03-07_0.png");
        assert_eq!(namer.name(42), "2024-03-07_42.png");
    }

    #[test]
    fn test_today_has_iso_date_shape() {
        let stamp = FrameNamer::today().date_stamp().to_owned();
        assert_eq!(stamp.len(), 10);
        assert!(NaiveDate::parse_from_str(&stamp, "%Y-%m-%d").is_ok());
    }
}
