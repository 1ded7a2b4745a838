//! Accounts and their budgets.

mod budget;
mod core;

pub use budget::{get_budget_endpoint, update_budget_endpoint};
pub use core::{create_account, verify_account};

#[cfg(test)]
pub use core::{get_account, get_budget};
