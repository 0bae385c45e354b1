//! Distress-type classification codes.

use serde::{Deserialize, Serialize};

/// Why a property is expected to sell (the "motivated seller" event).
///
/// Stored as a 3-character code in the `motive_types` lookup table and
/// referenced by captures, properties, and owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotiveType {
    Foreclosure,
    Divorce,
    Probate,
    TaxSale,
}

impl MotiveType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Foreclosure => "FCL",
            Self::Divorce => "DIV",
            Self::Probate => "PRB",
            Self::TaxSale => "TAX",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Foreclosure => "Foreclosure",
            Self::Divorce => "Divorce",
            Self::Probate => "Probate",
            Self::TaxSale => "Tax Sale",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FCL" => Some(Self::Foreclosure),
            "DIV" => Some(Self::Divorce),
            "PRB" => Some(Self::Probate),
            "TAX" => Some(Self::TaxSale),
            _ => None,
        }
    }

    /// All known motive types, in seed order.
    pub fn all() -> [MotiveType; 4] {
        [
            Self::Foreclosure,
            Self::Divorce,
            Self::Probate,
            Self::TaxSale,
        ]
    }
}
