//! The record store: every person, their expenses, and the active currency
//!
//! All amounts in a [`Store`] are minor units of a single active currency.
//! Amounts can only be written through the store's setters, which check that
//! the value was entered in the active currency, and the currency itself is
//! only changed by [`convert_all`](crate::convert_all), which rewrites every
//! amount in the same step.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::{Amount, Currency};

/// A stable identifier for a [`Person`], unique for the lifetime of a store
/// including across reloads
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PersonId(u64);

impl PersonId {
    /// Wrap a raw identifier
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single line of spending
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    amount_cents: i64,
    #[serde(default)]
    note: String,
}

impl Expense {
    /// The amount spent, in minor units of the store's currency
    #[must_use]
    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }

    /// Free text describing the expense
    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }
}

/// A budget card: a base total and the expenses recorded against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    id: PersonId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    base_total_cents: i64,
    #[serde(default)]
    expenses: Vec<Expense>,
}

impl Person {
    fn new(id: PersonId) -> Self {
        Self {
            id,
            name: String::new(),
            base_total_cents: 0,
            expenses: vec![Expense::default()],
        }
    }

    /// The person's identifier
    #[must_use]
    pub fn id(&self) -> PersonId {
        self.id
    }

    /// The person's name. May be blank.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the person
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The budget, in minor units
    #[must_use]
    pub fn base_total_cents(&self) -> i64 {
        self.base_total_cents
    }

    /// The expenses, in the order they were added
    #[must_use]
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Total of every expense, clamped to the range of `i64`
    #[must_use]
    pub fn spent_cents(&self) -> i64 {
        self.expenses
            .iter()
            .map(Expense::amount_cents)
            .fold(0, i64::saturating_add)
    }

    /// What is left of the budget. Negative when overspent, clamped to the
    /// range of `i64`.
    #[must_use]
    pub fn remaining_cents(&self) -> i64 {
        self.base_total_cents.saturating_sub(self.spent_cents())
    }

    fn expense_mut(&mut self, index: usize) -> Result<&mut Expense, Error> {
        let person = self.id;
        self.expenses
            .get_mut(index)
            .ok_or(Error::ExpenseNotFound { person, index })
    }

    fn amounts_mut(&mut self) -> impl Iterator<Item = &mut i64> {
        std::iter::once(&mut self.base_total_cents).chain(
            self.expenses
                .iter_mut()
                .map(|expense| &mut expense.amount_cents),
        )
    }
}

/// Errors from looking up or editing records
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No person has this id.
    ///
    /// The store decides which ids exist, so asking for an unknown id is a
    /// logic error in the caller.
    #[error("person {0} not found")]
    NotFound(PersonId),

    /// The person has no expense at this position
    #[error("person {person} has no expense at position {index}")]
    ExpenseNotFound {
        /// The person that was searched
        person: PersonId,

        /// The position that was asked for
        index: usize,
    },

    /// A person always keeps at least one expense line
    #[error("cannot remove the last expense of person {0}")]
    LastExpense(PersonId),

    /// Every id has been handed out
    #[error("no person ids left")]
    IdsExhausted,
}

/// The list of people and the currency all their amounts are held in
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    currency: Currency,
    people: IndexMap<PersonId, Person>,
    next_id: u64,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}

impl Store {
    /// An empty store holding amounts in `currency`
    #[must_use]
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            people: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a store from saved records.
    ///
    /// New ids continue from one past the largest id found. `u64::MAX` is
    /// never handed out, so a store holding it can't add anyone.
    #[must_use]
    pub fn from_records(currency: Currency, records: Vec<Person>) -> Self {
        let mut people = IndexMap::with_capacity(records.len());
        for person in records {
            if let Some(duplicate) = people.insert(person.id, person) {
                tracing::event!(
                    Level::WARN,
                    id = %duplicate.id,
                    "dropping duplicate person record"
                );
            }
        }

        let next_id = people
            .keys()
            .map(|id| id.get().saturating_add(1))
            .max()
            .unwrap_or(1);

        Self {
            currency,
            people,
            next_id,
        }
    }

    /// The currency every amount is denominated in
    #[must_use]
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Every person, in the order they were added
    pub fn list_all(&self) -> impl ExactSizeIterator<Item = &Person> + '_ {
        self.people.values()
    }

    /// The number of people
    #[must_use]
    pub fn len(&self) -> usize {
        self.people.len()
    }

    /// Whether the store holds no people
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Look up a person
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown
    pub fn find(&self, id: PersonId) -> Result<&Person, Error> {
        self.people.get(&id).ok_or(Error::NotFound(id))
    }

    fn find_mut(&mut self, id: PersonId) -> Result<&mut Person, Error> {
        self.people.get_mut(&id).ok_or(Error::NotFound(id))
    }

    /// Add a blank person with a fresh id and a single empty expense line
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdsExhausted`] once the id counter has run out
    pub fn add(&mut self) -> Result<&Person, Error> {
        let id = PersonId::new(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or(Error::IdsExhausted)?;

        tracing::event!(Level::DEBUG, %id, "adding person");

        Ok(&*self.people.entry(id).or_insert_with(|| Person::new(id)))
    }

    /// Add a blank person if there are none, so there is always a card to edit
    ///
    /// # Errors
    ///
    /// Fails as [`Store::add`] does
    pub fn ensure_not_empty(&mut self) -> Result<(), Error> {
        if self.is_empty() {
            self.add()?;
        }
        Ok(())
    }

    /// Replace the stored record with the same id.
    ///
    /// The record must have been read from this store since the last currency
    /// conversion, otherwise its amounts are in the wrong currency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id
    pub fn update(&mut self, person: Person) -> Result<(), Error> {
        let slot = self.find_mut(person.id)?;
        *slot = person;
        Ok(())
    }

    /// Remove a person and all their expenses
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown
    pub fn remove(&mut self, id: PersonId) -> Result<Person, Error> {
        tracing::event!(Level::DEBUG, %id, "removing person");
        self.people.shift_remove(&id).ok_or(Error::NotFound(id))
    }

    /// Rename a person
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown
    pub fn set_name(&mut self, id: PersonId, name: impl Into<String>) -> Result<(), Error> {
        self.find_mut(id)?.set_name(name);
        Ok(())
    }

    /// Set a person's budget
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown
    pub fn set_base_total(&mut self, id: PersonId, amount: Amount) -> Result<(), Error> {
        self.check_currency(amount);
        self.find_mut(id)?.base_total_cents = amount.minor;
        Ok(())
    }

    /// Append an empty expense line, returning its position
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown
    pub fn push_expense(&mut self, id: PersonId) -> Result<usize, Error> {
        let person = self.find_mut(id)?;
        person.expenses.push(Expense::default());
        Ok(person.expenses.len() - 1)
    }

    /// Set the amount of one expense
    ///
    /// # Errors
    ///
    /// Fails if the person or the expense doesn't exist
    pub fn set_expense_amount(
        &mut self,
        id: PersonId,
        index: usize,
        amount: Amount,
    ) -> Result<(), Error> {
        self.check_currency(amount);
        self.find_mut(id)?.expense_mut(index)?.amount_cents = amount.minor;
        Ok(())
    }

    /// Set the note of one expense
    ///
    /// # Errors
    ///
    /// Fails if the person or the expense doesn't exist
    pub fn set_expense_note(
        &mut self,
        id: PersonId,
        index: usize,
        note: impl Into<String>,
    ) -> Result<(), Error> {
        self.find_mut(id)?.expense_mut(index)?.note = note.into();
        Ok(())
    }

    /// Remove one expense line. The last remaining line can't be removed.
    ///
    /// # Errors
    ///
    /// Fails if the person or the expense doesn't exist, or if it is the
    /// person's only expense
    pub fn remove_expense(&mut self, id: PersonId, index: usize) -> Result<Expense, Error> {
        let person = self.find_mut(id)?;
        if index >= person.expenses.len() {
            return Err(Error::ExpenseNotFound { person: id, index });
        }
        if person.expenses.len() == 1 {
            return Err(Error::LastExpense(id));
        }
        Ok(person.expenses.remove(index))
    }

    fn check_currency(&self, amount: Amount) {
        debug_assert_eq!(
            amount.currency, self.currency,
            "amount entered in {} but the store holds {}",
            amount.currency, self.currency
        );
    }

    /// Every stored amount: each base total followed by that person's
    /// expenses
    pub(crate) fn amounts_mut(&mut self) -> impl Iterator<Item = &mut i64> {
        self.people.values_mut().flat_map(|person| person.amounts_mut())
    }

    pub(crate) fn set_currency(&mut self, currency: Currency) {
        self.currency = currency;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor: i64) -> Amount {
        Amount::new(minor, Currency::Usd)
    }

    #[test]
    fn ids_are_monotonic() {
        let mut store = Store::default();
        let a = store.add().unwrap().id();
        let b = store.add().unwrap().id();
        store.remove(b).unwrap();
        let c = store.add().unwrap().id();

        assert_eq!(a, PersonId::new(1));
        assert_eq!(b, PersonId::new(2));
        assert_eq!(c, PersonId::new(3));
    }

    #[test]
    fn ids_continue_after_reload() {
        let mut original = Store::default();
        for _ in 0..3 {
            original.add().unwrap();
        }
        original.remove(PersonId::new(1)).unwrap();

        let records = original.list_all().cloned().collect();
        let mut reloaded = Store::from_records(Currency::Rub, records);

        assert_eq!(reloaded.currency(), Currency::Rub);
        assert_eq!(reloaded.add().unwrap().id(), PersonId::new(4));
    }

    #[test]
    fn new_person_has_one_expense() {
        let mut store = Store::default();
        let person = store.add().unwrap();

        assert_eq!(person.expenses().len(), 1);
        assert_eq!(person.remaining_cents(), 0);
        assert!(person.name().is_empty());
    }

    #[test]
    fn remaining_may_be_negative() {
        let mut store = Store::default();
        let id = store.add().unwrap().id();
        store.set_base_total(id, usd(1000)).unwrap();
        store.set_expense_amount(id, 0, usd(700)).unwrap();
        let second = store.push_expense(id).unwrap();
        store.set_expense_amount(id, second, usd(800)).unwrap();

        let person = store.find(id).unwrap();
        assert_eq!(person.spent_cents(), 1500);
        assert_eq!(person.remaining_cents(), -500);
    }

    #[test]
    fn last_expense_is_kept() {
        let mut store = Store::default();
        let id = store.add().unwrap().id();
        store.push_expense(id).unwrap();

        store.remove_expense(id, 1).unwrap();
        assert_eq!(store.remove_expense(id, 0), Err(Error::LastExpense(id)));
        assert_eq!(
            store.remove_expense(id, 5),
            Err(Error::ExpenseNotFound {
                person: id,
                index: 5
            })
        );
        assert_eq!(store.find(id).unwrap().expenses().len(), 1);
    }

    #[test]
    fn unknown_person() {
        let mut store = Store::default();
        let missing = PersonId::new(42);

        assert_eq!(store.find(missing), Err(Error::NotFound(missing)));
        assert_eq!(store.set_name(missing, "x"), Err(Error::NotFound(missing)));
        assert!(store.remove(missing).is_err());
    }

    #[test]
    fn update_replaces_record() {
        let mut store = Store::default();
        let id = store.add().unwrap().id();

        let mut person = store.find(id).unwrap().clone();
        person.set_name("Anya");
        store.update(person).unwrap();

        assert_eq!(store.find(id).unwrap().name(), "Anya");
    }

    #[test]
    fn ensure_not_empty_seeds_once() {
        let mut store = Store::default();
        store.ensure_not_empty().unwrap();
        store.ensure_not_empty().unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let mut store = Store::default();
        let ids: Vec<_> = (0..4).map(|_| store.add().unwrap().id()).collect();
        store.remove(ids[1]).unwrap();

        let listed: Vec<_> = store.list_all().map(Person::id).collect();
        assert_eq!(listed, [ids[0], ids[2], ids[3]]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "amount entered in JPY but the store holds USD")]
    fn rejects_foreign_currency() {
        let mut store = Store::default();
        let id = store.add().unwrap().id();
        store
            .set_base_total(id, Amount::new(500, Currency::Jpy))
            .unwrap();
    }

    #[test]
    fn reads_camel_case_records() {
        let raw = r#"{"id": 7, "name": "Kolya", "baseTotalCents": 10000,
                      "expenses": [{"amountCents": 2500, "note": "lunch"}]}"#;
        let person: Person = serde_json::from_str(raw).unwrap();

        assert_eq!(person.id(), PersonId::new(7));
        assert_eq!(person.remaining_cents(), 7500);
        assert_eq!(person.expenses()[0].note(), "lunch");
    }

    #[test]
    fn huge_expenses_saturate() {
        let mut store = Store::default();
        let id = store.add().unwrap().id();
        store.set_expense_amount(id, 0, usd(i64::MAX)).unwrap();
        let second = store.push_expense(id).unwrap();
        store.set_expense_amount(id, second, usd(i64::MAX)).unwrap();

        let person = store.find(id).unwrap();
        assert_eq!(person.spent_cents(), i64::MAX);
        assert_eq!(person.remaining_cents(), -i64::MAX);

        store.set_base_total(id, usd(i64::MIN)).unwrap();
        assert_eq!(store.find(id).unwrap().remaining_cents(), i64::MIN);
    }

    #[test]
    fn last_id_is_never_handed_out() {
        let raw = r#"{"id": 18446744073709551615, "expenses": [{}]}"#;
        let person: Person = serde_json::from_str(raw).unwrap();
        let mut store = Store::from_records(Currency::Usd, vec![person]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.add().unwrap_err(), Error::IdsExhausted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn second_to_last_id_is_the_end() {
        let mut store = Store::from_records(
            Currency::Usd,
            vec![Person::new(PersonId::new(u64::MAX - 2))],
        );

        assert_eq!(store.add().unwrap().id(), PersonId::new(u64::MAX - 1));
        assert_eq!(store.add().unwrap_err(), Error::IdsExhausted);
    }
}
