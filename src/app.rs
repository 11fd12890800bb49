use std::sync::{Arc, Mutex, MutexGuard};

use moneytracker_lib::{
    money, Amount, Currency, JsonFile, Person, PersonId, Persistence, RateFetcher, Store,
};
use tokio::sync::mpsc;
use tracing::{instrument, Level};

use crate::{config::Config, Error};

mod convert;
pub use convert::Notice;

/// A budgeting session.
///
/// The app owns the record store for as long as the UI shell keeps it. Every
/// edit is saved as soon as it is made. Edits are serialised on the store,
/// and a currency conversion holds the store for its whole rewrite-and-save
/// step, so edits never interleave with a conversion.
#[derive(Debug)]
pub struct App {
    store: Arc<Mutex<Store>>,
    persistence: Arc<dyn Persistence>,
    fetcher: RateFetcher,
    in_flight: tokio::sync::Mutex<()>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl App {
    /// Wire up an app from its parts
    pub fn new(store: Store, persistence: Box<dyn Persistence>, fetcher: RateFetcher) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            persistence: Arc::from(persistence),
            fetcher,
            in_flight: tokio::sync::Mutex::new(()),
            notices: None,
        }
    }

    /// Load the saved records and set up the configured rate sources.
    ///
    /// A fresh install starts with a single blank person.
    ///
    /// # Errors
    ///
    /// Fails if the data file location can't be determined, if an existing
    /// data file can't be read, or if an HTTP client can't be built
    #[instrument(skip(config))]
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let persistence = JsonFile::new(config.data_path()?);
        let mut store = persistence.load()?.unwrap_or_default();
        store.ensure_not_empty()?;

        tracing::event!(
            Level::INFO,
            path = %persistence.path().display(),
            currency = %store.currency(),
            people = store.len(),
            "loaded records"
        );

        let fetcher = RateFetcher::from_config(&config.sources, config.timeouts())?;

        Ok(Self::new(store, Box::new(persistence), fetcher))
    }

    /// Load the config file, then the app it describes
    ///
    /// # Errors
    ///
    /// Fails if the config or the records can't be loaded
    pub fn from_config_file() -> Result<Self, Error> {
        Self::from_config(&Config::load()?)
    }

    /// Subscribe to conversion notices.
    ///
    /// Only the most recent subscriber receives notices.
    pub fn notices(&mut self) -> mpsc::UnboundedReceiver<Notice> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.notices = Some(sender);
        receiver
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, Error> {
        lock(&self.store)
    }

    fn read_store<T>(&self, op: impl FnOnce(&Store) -> Result<T, Error>) -> Result<T, Error> {
        op(&*self.lock()?)
    }

    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut Store) -> Result<T, moneytracker_lib::store::Error>,
    ) -> Result<T, Error> {
        let mut store = self.lock()?;
        let value = op(&mut store)?;
        self.persistence.save(&store)?;
        Ok(value)
    }

    /// The currency all amounts are currently held in
    ///
    /// # Errors
    ///
    /// Fails only if the store is poisoned
    pub fn active_currency(&self) -> Result<Currency, Error> {
        self.read_store(|store| Ok(store.currency()))
    }

    /// A copy of every person, in order
    ///
    /// # Errors
    ///
    /// Fails only if the store is poisoned
    pub fn people(&self) -> Result<Vec<Person>, Error> {
        self.read_store(|store| Ok(store.list_all().cloned().collect()))
    }

    /// A copy of one person
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown
    pub fn person(&self, id: PersonId) -> Result<Person, Error> {
        self.read_store(|store| Ok(store.find(id)?.clone()))
    }

    /// What a person has left, formatted in the active currency
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown
    pub fn remaining_text(&self, id: PersonId) -> Result<String, Error> {
        self.read_store(|store| {
            let remaining = store.find(id)?.remaining_cents();
            Ok(money::format(remaining, store.currency()))
        })
    }

    /// Add a blank person
    ///
    /// # Errors
    ///
    /// Fails if the store can't be saved
    pub fn add_person(&self) -> Result<PersonId, Error> {
        self.with_store(|store| Ok(store.add()?.id()))
    }

    /// Remove a person and their expenses
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the store can't be saved
    pub fn remove_person(&self, id: PersonId) -> Result<(), Error> {
        self.with_store(|store| store.remove(id).map(drop))
    }

    /// Replace a person's record with an edited copy.
    ///
    /// The copy must have been read after the most recent conversion.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the store can't be saved
    pub fn update_person(&self, person: Person) -> Result<(), Error> {
        self.with_store(|store| store.update(person))
    }

    /// Rename a person
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the store can't be saved
    pub fn set_name(&self, id: PersonId, name: &str) -> Result<(), Error> {
        self.with_store(|store| store.set_name(id, name))
    }

    /// Set a person's budget from user input in the active currency.
    /// Unreadable input counts as zero.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the store can't be saved
    pub fn set_base_total_text(&self, id: PersonId, text: &str) -> Result<(), Error> {
        self.with_store(|store| {
            let amount = Amount::parse(text, store.currency());
            store.set_base_total(id, amount)
        })
    }

    /// Add an empty expense line, returning its position
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or the store can't be saved
    pub fn add_expense(&self, id: PersonId) -> Result<usize, Error> {
        self.with_store(|store| store.push_expense(id))
    }

    /// Set an expense amount from user input in the active currency.
    /// Unreadable input counts as zero.
    ///
    /// # Errors
    ///
    /// Fails if the expense doesn't exist or the store can't be saved
    pub fn set_expense_amount_text(
        &self,
        id: PersonId,
        index: usize,
        text: &str,
    ) -> Result<(), Error> {
        self.with_store(|store| {
            let amount = Amount::parse(text, store.currency());
            store.set_expense_amount(id, index, amount)
        })
    }

    /// Set an expense note
    ///
    /// # Errors
    ///
    /// Fails if the expense doesn't exist or the store can't be saved
    pub fn set_expense_note(&self, id: PersonId, index: usize, note: &str) -> Result<(), Error> {
        self.with_store(|store| store.set_expense_note(id, index, note))
    }

    /// Remove an expense line. A person's last line can't be removed.
    ///
    /// # Errors
    ///
    /// Fails if the expense doesn't exist, is the last one, or the store can't
    /// be saved
    pub fn remove_expense(&self, id: PersonId, index: usize) -> Result<(), Error> {
        self.with_store(|store| store.remove_expense(id, index).map(drop))
    }
}

fn lock(store: &Mutex<Store>) -> Result<MutexGuard<'_, Store>, Error> {
    store.lock().map_err(|_| Error::Poisoned)
}
