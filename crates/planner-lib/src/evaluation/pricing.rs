//! Billing arithmetic
//!
//! VM usage is charged in whole billing units; partial units are billed in
//! full. Billed units are computed on integer milliseconds so the cost
//! calculation never accumulates floating point drift.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum granularity for which VM usage is charged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingUnit {
    Second,
    Minute,
    #[default]
    Hour,
    Day,
}

impl BillingUnit {
    pub fn as_duration(&self) -> Duration {
        match self {
            BillingUnit::Second => Duration::seconds(1),
            BillingUnit::Minute => Duration::minutes(1),
            BillingUnit::Hour => Duration::hours(1),
            BillingUnit::Day => Duration::days(1),
        }
    }

    /// Number of billing units charged for the span `[start, end)`
    pub fn billed_units(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let span_ms = (end - start).num_milliseconds();
        if span_ms <= 0 {
            return 0;
        }
        let unit_ms = self.as_duration().num_milliseconds();
        (span_ms + unit_ms - 1) / unit_ms
    }
}

impl fmt::Display for BillingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BillingUnit::Second => "second",
            BillingUnit::Minute => "minute",
            BillingUnit::Hour => "hour",
            BillingUnit::Day => "day",
        };
        f.write_str(name)
    }
}

/// Budget and billing configuration supplied per planning cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingModel {
    /// Spending limit for one scaling horizon
    #[serde(default = "unlimited_budget")]
    pub budget: f64,
    #[serde(default)]
    pub billing_unit: BillingUnit,
}

fn unlimited_budget() -> f64 {
    f64::MAX
}

impl Default for PricingModel {
    fn default() -> Self {
        Self {
            budget: unlimited_budget(),
            billing_unit: BillingUnit::Hour,
        }
    }
}

/// Round to `decimals` decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
