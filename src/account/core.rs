//! The account record and the operations that read and write it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    auth::PasswordHash,
    session::{Session, create_session},
    store::{EntityType, Item, ItemKey, KeyValueStore},
};

/// A registered user and their monthly budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The email the user signs in with. Emails are case-sensitive.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The salted hash of the user's password.
    pub password: PasswordHash,
    /// The monthly budget in the base currency, stored as a decimal string.
    pub budget: Decimal,
}

fn account_key(email: &str) -> ItemKey {
    ItemKey::new(EntityType::Account, email)
}

/// Get the account registered with `email`.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such account, or a store error.
pub fn get_account(store: &dyn KeyValueStore, email: &str) -> Result<Account, Error> {
    store
        .get(&account_key(email))?
        .ok_or(Error::NotFound)?
        .to_record()
}

/// Whether an account is registered with `email`.
pub fn account_exists(store: &dyn KeyValueStore, email: &str) -> Result<bool, Error> {
    Ok(store.get(&account_key(email))?.is_some())
}

fn put_account(store: &dyn KeyValueStore, account: &Account) -> Result<(), Error> {
    store.put(Item::from_record(account_key(&account.email), account)?)
}

/// Register a new account with a budget of zero.
///
/// The password is hashed with `password_hash_cost` before it is stored.
///
/// # Errors
/// Returns:
/// - [Error::Validation] if the email, name or password is empty,
/// - [Error::DuplicateEmail] if an account with `email` already exists,
/// - [Error::HashingError] if the password could not be hashed,
/// - or a store error.
pub fn create_account(
    store: &dyn KeyValueStore,
    email: &str,
    name: &str,
    raw_password: &str,
    password_hash_cost: u32,
) -> Result<Account, Error> {
    if email.trim().is_empty() {
        return Err(Error::Validation("email cannot be empty".to_owned()));
    }

    if name.trim().is_empty() {
        return Err(Error::Validation("name cannot be empty".to_owned()));
    }

    // Skips hashing for emails that are already taken.
    if account_exists(store, email)? {
        return Err(Error::DuplicateEmail);
    }

    let account = Account {
        email: email.to_owned(),
        name: name.to_owned(),
        password: PasswordHash::from_raw_password(raw_password, password_hash_cost)?,
        budget: Decimal::ZERO,
    };

    // Another sign-up for the same email may have finished while hashing.
    if !store.insert(Item::from_record(account_key(email), &account)?)? {
        return Err(Error::DuplicateEmail);
    }
    tracing::info!("Created account for {email}");

    Ok(account)
}

/// Check `raw_password` against the account registered with `email` and
/// start a session for it.
///
/// # Errors
/// Returns [Error::InvalidCredentials] if there is no such account or the
/// password does not match, [Error::HashingError] if the stored hash could
/// not be checked, or a store error.
pub fn verify_account(
    store: &dyn KeyValueStore,
    email: &str,
    raw_password: &str,
) -> Result<Session, Error> {
    let account = match get_account(store, email) {
        Ok(account) => account,
        Err(Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(error) => return Err(error),
    };

    match account.password.verify(raw_password) {
        Ok(true) => create_session(store, &account.email, &account.name),
        Ok(false) => Err(Error::InvalidCredentials),
        Err(error) => Err(Error::HashingError(error.to_string())),
    }
}

/// Get the budget of the account registered with `email`.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such account, or a store error.
pub fn get_budget(store: &dyn KeyValueStore, email: &str) -> Result<Decimal, Error> {
    get_account(store, email).map(|account| account.budget)
}

/// Set the budget of the account registered with `email`, leaving the other
/// fields unchanged.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such account, or a store error.
pub fn update_budget(store: &dyn KeyValueStore, email: &str, budget: Decimal) -> Result<(), Error> {
    let mut account = get_account(store, email)?;
    account.budget = budget;

    put_account(store, &account)
}
