//! Shared primitive types used across the entire pipeline.

/// A customer identifier. Not unique per row: one customer may have many events.
pub type CustomerId = String;

/// A house (venue / campaign) identifier.
pub type HouseId = String;

/// A 3-digit PLZ code, kept as a fixed-width string so leading zeros survive.
pub type PlzCode = String;

/// An ISO week, identified by its Monday in `YYYY-MM-DD` form.
pub type WeekKey = String;
