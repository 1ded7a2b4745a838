//! The fixed set of spending categories.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The category of a transaction.
///
/// Values from outside the application (the description parser, update
/// requests) go through [Category::coerce], so anything unrecognised ends up
/// as [Category::Miscellaneous] instead of being stored verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Category {
    /// Retail purchases such as clothes and electronics.
    Shopping,
    /// Food and household supplies.
    Groceries,
    /// Recurring services such as streaming.
    Subscriptions,
    /// Loan and credit repayments.
    Loans,
    /// Rent, mortgage and home costs.
    Housing,
    /// Public transport, taxis and fuel.
    Transport,
    /// Restaurants, cafes and takeaway.
    Dining,
    /// Power, water, phone and internet.
    Utilities,
    /// Money moved to other people or accounts.
    Transfers,
    /// Tax payments.
    Taxes,
    /// Doctors, pharmacy and other medical costs.
    Healthcare,
    /// Insurance premiums.
    Insurance,
    /// Events, games and hobbies.
    Entertainment,
    /// The fallback for anything that does not fit the other categories.
    #[default]
    Miscellaneous,
}

impl Category {
    /// Every category, in the order they are offered to the description parser.
    pub const ALL: [Category; 14] = [
        Category::Shopping,
        Category::Groceries,
        Category::Subscriptions,
        Category::Loans,
        Category::Housing,
        Category::Transport,
        Category::Dining,
        Category::Utilities,
        Category::Transfers,
        Category::Taxes,
        Category::Healthcare,
        Category::Insurance,
        Category::Entertainment,
        Category::Miscellaneous,
    ];

    /// The category's display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Shopping => "Shopping",
            Category::Groceries => "Groceries",
            Category::Subscriptions => "Subscriptions",
            Category::Loans => "Loans",
            Category::Housing => "Housing",
            Category::Transport => "Transport",
            Category::Dining => "Dining",
            Category::Utilities => "Utilities",
            Category::Transfers => "Transfers",
            Category::Taxes => "Taxes",
            Category::Healthcare => "Healthcare",
            Category::Insurance => "Insurance",
            Category::Entertainment => "Entertainment",
            Category::Miscellaneous => "Miscellaneous",
        }
    }

    /// Match `raw` against the category names, ignoring case and surrounding
    /// whitespace, falling back to [Category::Miscellaneous].
    pub fn coerce(raw: &str) -> Self {
        let raw = raw.trim();

        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or_else(|| {
                tracing::debug!("Unrecognised category {raw:?}, using Miscellaneous");
                Category::Miscellaneous
            })
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::coerce(&value)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
