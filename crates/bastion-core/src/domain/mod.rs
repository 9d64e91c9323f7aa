//! Domain entities and policies for request governance.

mod account;
mod lockout;
mod tier;

pub use account::Account;
pub use lockout::{FailureOutcome, LockoutPolicy, normalize_identifier};
pub use tier::{Admission, Tier, TierQuotas, WindowDecision};
