use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Bar period of a series. Also names the output sub-directory of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h" | "hour" | "hourly" => Ok(Period::Hourly),
            "d" | "day" | "daily" => Ok(Period::Daily),
            "w" | "week" | "weekly" => Ok(Period::Weekly),
            "mo" | "month" | "monthly" => Ok(Period::Monthly),
            other => Err(Error::InvalidInput(format!("unknown period: {other}"))),
        }
    }
}
