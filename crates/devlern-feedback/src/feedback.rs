//! Parsing of human judgments.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A user's verdict on the most recent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSign {
    Positive,
    Negative,
    /// Anything that is neither; contributes no feedback reward.
    Neutral,
}

impl FeedbackSign {
    /// Total over all inputs: unrecognized text is [`FeedbackSign::Neutral`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" | "+" | "👍" | "up" | "good" => Self::Positive,
            "negative" | "-" | "👎" | "down" | "bad" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self == Self::Positive
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self == Self::Negative
    }
}

impl FromStr for FeedbackSign {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for FeedbackSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        })
    }
}
