//! Request lifecycle rules: the status and payment state machines, the
//! pricing table and ingress normalization for duck-typed client fields.
//!
//! Every status mutation in the service goes through the transition checks
//! here, so the admin, agent and lab flows all share one authoritative table.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Base charge for the field visit, in LKR.
pub const SOIL_TESTING_COST: i32 = 1_500;
/// Base charge for the laboratory analysis, in LKR.
pub const LAB_ANALYSIS_COST: i32 = 1_500;
/// Charge for each soil test beyond the first, in LKR.
pub const ADDITIONAL_TEST_COST: i32 = 700;
/// One soil test covers up to this much land, in square feet.
pub const SQFT_PER_TEST: i64 = 5_000;
pub const SQFT_PER_ACRE: i64 = 43_560;

/// Sri Lankan administrative districts used for assignment and filtering.
pub const DISTRICTS: [&str; 25] = [
    "Ampara",
    "Anuradhapura",
    "Badulla",
    "Batticaloa",
    "Colombo",
    "Galle",
    "Gampaha",
    "Hambantota",
    "Jaffna",
    "Kalutara",
    "Kandy",
    "Kegalle",
    "Kilinochchi",
    "Kurunegala",
    "Mannar",
    "Matale",
    "Matara",
    "Monaragala",
    "Mullaitivu",
    "Nuwara Eliya",
    "Polonnaruwa",
    "Puttalam",
    "Ratnapura",
    "Trincomalee",
    "Vavuniya",
];

pub fn is_known_district(district: &str) -> bool {
    DISTRICTS.contains(&district)
}

/// Collection time slots farmers can pick from.
pub const TIME_PERIODS: [&str; 8] = [
    "8:00 AM - 9:00 AM",
    "9:00 AM - 10:00 AM",
    "10:00 AM - 11:00 AM",
    "11:00 AM - 12:00 PM",
    "12:00 PM - 1:00 PM",
    "1:00 PM - 2:00 PM",
    "2:00 PM - 3:00 PM",
    "3:00 PM - 4:00 PM",
];

pub fn is_known_time_period(period: &str) -> bool {
    TIME_PERIODS.contains(&period)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Scheduled,
    #[serde(rename = "Sample Collected")]
    SampleCollected,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Scheduled => "Scheduled",
            RequestStatus::SampleCollected => "Sample Collected",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::Completed => "Completed",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(RequestStatus::Pending),
            "Scheduled" => Some(RequestStatus::Scheduled),
            "Sample Collected" => Some(RequestStatus::SampleCollected),
            "In Progress" => Some(RequestStatus::InProgress),
            "Completed" => Some(RequestStatus::Completed),
            "Cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }

    /// Position in the forward ordering. `Cancelled` sits outside of it and
    /// is only reachable through the explicit rule in `can_transition_to`.
    fn rank(&self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Scheduled => 1,
            RequestStatus::SampleCollected => 2,
            RequestStatus::InProgress => 3,
            RequestStatus::Completed => 4,
            RequestStatus::Cancelled => 5,
        }
    }

    /// A transition is legal from any non-terminal state to `Cancelled`, or
    /// forward to a strictly later state in the ordering. This admits both
    /// the admin's one-step advances and the agent's jump straight to
    /// `Sample Collected` on test submission, and keeps terminal states
    /// absorbing.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == RequestStatus::Cancelled {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    #[serde(rename = "COCPending")]
    CocPending,
    #[serde(rename = "CompletedCOC")]
    CompletedCoc,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::CocPending => "COCPending",
            PaymentStatus::CompletedCoc => "CompletedCOC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Paid" => Some(PaymentStatus::Paid),
            "COCPending" => Some(PaymentStatus::CocPending),
            "CompletedCOC" => Some(PaymentStatus::CompletedCoc),
            _ => None,
        }
    }

    /// Cash-on-collection requests start in `COCPending`; everything else
    /// waits as `Pending` until the admin marks it paid.
    pub fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cash => PaymentStatus::CocPending,
            PaymentMethod::Card => PaymentStatus::Pending,
        }
    }

    /// Admins may force `Paid` from anywhere, and close out a cash flow with
    /// `CompletedCOC` only from `COCPending`.
    pub fn admin_can_set(from: PaymentStatus, to: PaymentStatus) -> bool {
        match to {
            PaymentStatus::Paid => from != PaymentStatus::Paid,
            PaymentStatus::CompletedCoc => from == PaymentStatus::CocPending,
            _ => false,
        }
    }

    /// The only agent-driven payment transition: collecting the cash at the
    /// sample pickup.
    pub fn agent_can_set(from: PaymentStatus, to: PaymentStatus) -> bool {
        from == PaymentStatus::CocPending && to == PaymentStatus::CompletedCoc
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "card")]
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandUnit {
    #[serde(rename = "acres")]
    Acres,
    #[serde(rename = "sqft")]
    SquareFeet,
}

impl LandUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandUnit::Acres => "acres",
            LandUnit::SquareFeet => "sqft",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "acres" => Some(LandUnit::Acres),
            "sqft" => Some(LandUnit::SquareFeet),
            _ => None,
        }
    }
}

/// Server-computed price for a request. Client-sent totals are never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub number_of_tests: i32,
    pub total_cost: i32,
}

/// One test covers 5000 sq.ft; each extra increment adds a reduced charge.
/// Non-positive land sizes fall back to a single base test.
pub fn quote_for_land(land_size: Decimal, unit: LandUnit) -> Quote {
    let land_sqft = match unit {
        LandUnit::Acres => land_size * Decimal::from(SQFT_PER_ACRE),
        LandUnit::SquareFeet => land_size,
    };

    let base = SOIL_TESTING_COST + LAB_ANALYSIS_COST;
    if land_sqft <= Decimal::ZERO {
        return Quote {
            number_of_tests: 1,
            total_cost: base,
        };
    }

    let number_of_tests = (land_sqft / Decimal::from(SQFT_PER_TEST))
        .ceil()
        .to_i32()
        .unwrap_or(1)
        .max(1);

    Quote {
        number_of_tests,
        total_cost: base + (number_of_tests - 1) * ADDITIONAL_TEST_COST,
    }
}

/// The client sends crops either as a free-text comma-separated string or as
/// a list. Both shapes normalize to a trimmed list of names on ingress.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CropsInput {
    List(Vec<String>),
    Text(String),
}

impl CropsInput {
    pub fn normalize(self) -> Vec<String> {
        let pieces = match self {
            CropsInput::List(items) => items,
            CropsInput::Text(text) => text.split(',').map(|s| s.to_string()).collect(),
        };
        pieces
            .into_iter()
            .flat_map(|item| {
                item.split(',')
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|s| !s.is_empty())
            .collect()
    }
}
