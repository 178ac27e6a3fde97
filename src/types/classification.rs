use serde::{Deserialize, Serialize};
use std::fmt;

/// Category reported by the classification service.
///
/// `Portrait` doubles as the neutral category: it carries no distinguishing
/// signal for scoring, and classifier failures degrade to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Portrait,
    Car,
    Apartment,
    Unknown,
}

impl Category {
    pub fn is_asset(self) -> bool {
        matches!(self, Category::Car | Category::Apartment)
    }

    pub fn is_neutral(self) -> bool {
        matches!(self, Category::Portrait)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Portrait => "portrait",
            Category::Car => "car",
            Category::Apartment => "apartment",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub confidence: f64,
    /// Set only on the fallback produced when the service could not be used.
    pub degraded: bool,
}

impl Classification {
    pub fn new(category: Category, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            category,
            confidence,
            degraded: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            category: Category::Portrait,
            confidence: FALLBACK_CONFIDENCE,
            degraded: true,
        }
    }
}
