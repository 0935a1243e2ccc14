//! Filter combinator over the customer-type × renewal cross-product.
//!
//! Enumeration order is fixed: customer type is the outer loop
//! (All, FTB, RB), renewal the inner loop (Include, Exclude).
//!
//! Each combination yields three views with different strictness:
//!   - `strict`:       customer-type filter AND renewal filter
//!   - `renewal_only`: renewal filter only (rate denominators)
//!   - `base`:         neither filter (unbiased baselines)

use crate::{
    dataset::{BuyerType, TransactionRecord},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Axes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    All,
    Ftb,
    Rb,
}

impl CustomerType {
    pub const ALL: [CustomerType; 3] = [CustomerType::All, CustomerType::Ftb, CustomerType::Rb];

    pub fn tag(&self) -> &'static str {
        match self {
            CustomerType::All => "all",
            CustomerType::Ftb => "ftb",
            CustomerType::Rb => "rb",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CustomerType::All => "All",
            CustomerType::Ftb => "FTB",
            CustomerType::Rb => "RB",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    pub fn admits(&self, buyer: BuyerType) -> bool {
        match self {
            CustomerType::All => true,
            CustomerType::Ftb => buyer == BuyerType::FirstTime,
            CustomerType::Rb => buyer == BuyerType::Returning,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RenewalMode {
    Include,
    Exclude,
}

impl RenewalMode {
    pub const ALL: [RenewalMode; 2] = [RenewalMode::Include, RenewalMode::Exclude];

    pub fn tag(&self) -> &'static str {
        match self {
            RenewalMode::Include => "incl",
            RenewalMode::Exclude => "excl",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RenewalMode::Include => "Include",
            RenewalMode::Exclude => "Exclude",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.tag() == tag)
    }

    pub fn admits(&self, is_renewal: bool) -> bool {
        match self {
            RenewalMode::Include => true,
            RenewalMode::Exclude => !is_renewal,
        }
    }
}

// ── Combination ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterCombo {
    pub customer_type: CustomerType,
    pub renewal: RenewalMode,
}

impl FilterCombo {
    pub const DEFAULT: FilterCombo = FilterCombo {
        customer_type: CustomerType::All,
        renewal: RenewalMode::Include,
    };

    pub fn new(customer_type: CustomerType, renewal: RenewalMode) -> Self {
        Self { customer_type, renewal }
    }

    /// All six combinations in enumeration order.
    pub fn all() -> Vec<FilterCombo> {
        CustomerType::ALL
            .into_iter()
            .flat_map(|c| RenewalMode::ALL.into_iter().map(move |r| FilterCombo::new(c, r)))
            .collect()
    }

    /// `__<customerType>__<renewal>`, e.g. `__ftb__excl`.
    pub fn suffix(&self) -> String {
        format!("__{}__{}", self.customer_type.tag(), self.renewal.tag())
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let rest = suffix.strip_prefix("__")?;
        let (customer, renewal) = rest.split_once("__")?;
        Some(FilterCombo::new(
            CustomerType::from_tag(customer)?,
            RenewalMode::from_tag(renewal)?,
        ))
    }

    pub fn describe(&self) -> String {
        format!(
            "Customer Type={}, Renewals={}",
            self.customer_type.label(),
            self.renewal.label()
        )
    }
}

// ── Views ────────────────────────────────────────────────────────────────────

/// A borrowed subset of the transaction table.
#[derive(Debug, Clone, Default)]
pub struct View<'a> {
    rows: Vec<&'a TransactionRecord>,
}

impl<'a> View<'a> {
    pub fn new(rows: Vec<&'a TransactionRecord>) -> Self {
        Self { rows }
    }

    pub fn from_records(records: &'a [TransactionRecord]) -> Self {
        Self { rows: records.iter().collect() }
    }

    pub fn rows(&self) -> &[&'a TransactionRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TransactionRecord> + '_ {
        self.rows.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filter<F>(&self, mut keep: F) -> View<'a>
    where
        F: FnMut(&TransactionRecord) -> bool,
    {
        View { rows: self.rows.iter().copied().filter(|r| keep(*r)).collect() }
    }

    pub fn distinct_customers(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.customer_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn customer_ids(&self) -> HashSet<&'a CustomerId> {
        self.rows.iter().copied().map(|r| &r.customer_id).collect()
    }

    pub fn revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.revenue).sum()
    }
}

/// The three views of one filter combination.
#[derive(Debug, Clone)]
pub struct FilteredViews<'a> {
    pub combo: FilterCombo,
    pub strict: View<'a>,
    pub renewal_only: View<'a>,
    pub base: View<'a>,
}

impl<'a> FilteredViews<'a> {
    pub fn derive(records: &'a [TransactionRecord], combo: FilterCombo) -> Self {
        let base = View::from_records(records);
        let renewal_only = base.filter(|r| combo.renewal.admits(r.is_renewal));
        let strict = renewal_only.filter(|r| combo.customer_type.admits(r.ftb_rb));
        Self { combo, strict, renewal_only, base }
    }
}

/// Every combination with its views, in enumeration order.
pub fn combinations(records: &[TransactionRecord]) -> Vec<FilteredViews<'_>> {
    FilterCombo::all()
        .into_iter()
        .map(|combo| FilteredViews::derive(records, combo))
        .collect()
}
