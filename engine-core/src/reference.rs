//! Reference entities and the store that owns them (spec §3, §4.2).
//!
//! Reference entities are immutable after insertion and shared by id from
//! many orders. A single reader-writer lock protects all inner maps; reads
//! dominate, so lookups only ever take the shared side.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::ReferenceStoreError;
use crate::ids::{Id, IdentifierGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AccountType {
    Principal,
    Agency,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instrument {
    pub id: Id,
    pub symbol: String,
    pub security_id: String,
    pub security_id_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Account {
    pub id: Id,
    pub account: String,
    pub firm: String,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Clearing {
    pub id: Id,
    pub firm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawData {
    pub id: Id,
    pub kind: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InternedString {
    pub id: Id,
    pub value: String,
}

/// Append-only ordered sequence of execution ids belonging to one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionList {
    pub exec_ids: Vec<Id>,
}

impl ExecutionList {
    pub fn push(&mut self, exec_id: Id) {
        self.exec_ids.push(exec_id);
    }
}

/// Hook invoked whenever a reference entity is freshly minted, so the
/// durable log can persist it (spec §4.13's record dispatcher).
pub trait ReferenceSaveObserver: Send + Sync {
    fn on_instrument_saved(&self, _instrument: &Instrument) {}
    fn on_account_saved(&self, _account: &Account) {}
    fn on_clearing_saved(&self, _clearing: &Clearing) {}
    fn on_raw_data_saved(&self, _raw: &RawData) {}
    fn on_string_saved(&self, _s: &InternedString) {}
}

#[derive(Default)]
struct Tables {
    instruments: HashMap<Id, Arc<Instrument>>,
    instrument_by_symbol: HashMap<String, Id>,
    accounts: HashMap<Id, Arc<Account>>,
    account_by_name: HashMap<String, Id>,
    clearings: HashMap<Id, Arc<Clearing>>,
    raw_data: HashMap<Id, Arc<RawData>>,
    strings: HashMap<Id, Arc<InternedString>>,
}

/// Owns every reference entity kind, keyed by [`Id`], with symbol/name
/// secondary indexes. Entities are never removed once inserted.
pub struct ReferenceStore {
    generator: Arc<IdentifierGenerator>,
    tables: RwLock<Tables>,
    observer: RwLock<Option<Arc<dyn ReferenceSaveObserver>>>,
}

impl ReferenceStore {
    pub fn new(generator: Arc<IdentifierGenerator>) -> Self {
        ReferenceStore {
            generator,
            tables: RwLock::new(Tables::default()),
            observer: RwLock::new(None),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn ReferenceSaveObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn add_instrument(&self, symbol: impl Into<String>, security_id: impl Into<String>, security_id_source: impl Into<String>) -> Id {
        let symbol = symbol.into();
        let mut tables = self.tables.write();
        if let Some(existing) = tables.instrument_by_symbol.get(&symbol) {
            return *existing;
        }
        let id = self.generator.next();
        let instrument = Arc::new(Instrument {
            id,
            symbol: symbol.clone(),
            security_id: security_id.into(),
            security_id_source: security_id_source.into(),
        });
        tables.instruments.insert(id, instrument.clone());
        tables.instrument_by_symbol.insert(symbol, id);
        drop(tables);
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_instrument_saved(&instrument);
        }
        id
    }

    /// Re-inserts an instrument with a known id, used only by the recovery
    /// path (spec §4.13) where the id was already minted before restart.
    pub fn restore_instrument(&self, instrument: Instrument) {
        let mut tables = self.tables.write();
        tables.instrument_by_symbol.insert(instrument.symbol.clone(), instrument.id);
        tables.instruments.insert(instrument.id, Arc::new(instrument));
    }

    pub fn get_instrument(&self, id: Id) -> Result<Arc<Instrument>, ReferenceStoreError> {
        self.tables.read().instruments.get(&id).cloned().ok_or(ReferenceStoreError::NotFound(id))
    }

    pub fn instrument_by_symbol(&self, symbol: &str) -> Option<Id> {
        self.tables.read().instrument_by_symbol.get(symbol).copied()
    }

    pub fn all_instrument_ids(&self) -> Vec<Id> {
        self.tables.read().instruments.keys().copied().collect()
    }

    pub fn add_account(&self, account: impl Into<String>, firm: impl Into<String>, account_type: AccountType) -> Id {
        let account = account.into();
        let mut tables = self.tables.write();
        if let Some(existing) = tables.account_by_name.get(&account) {
            return *existing;
        }
        let id = self.generator.next();
        let entity = Arc::new(Account { id, account: account.clone(), firm: firm.into(), account_type });
        tables.accounts.insert(id, entity.clone());
        tables.account_by_name.insert(account, id);
        drop(tables);
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_account_saved(&entity);
        }
        id
    }

    pub fn restore_account(&self, account: Account) {
        let mut tables = self.tables.write();
        tables.account_by_name.insert(account.account.clone(), account.id);
        tables.accounts.insert(account.id, Arc::new(account));
    }

    pub fn get_account(&self, id: Id) -> Result<Arc<Account>, ReferenceStoreError> {
        self.tables.read().accounts.get(&id).cloned().ok_or(ReferenceStoreError::NotFound(id))
    }

    pub fn account_by_name(&self, name: &str) -> Option<Id> {
        self.tables.read().account_by_name.get(name).copied()
    }

    pub fn add_clearing(&self, firm: impl Into<String>) -> Id {
        let id = self.generator.next();
        let entity = Arc::new(Clearing { id, firm: firm.into() });
        self.tables.write().clearings.insert(id, entity.clone());
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_clearing_saved(&entity);
        }
        id
    }

    pub fn restore_clearing(&self, clearing: Clearing) {
        self.tables.write().clearings.insert(clearing.id, Arc::new(clearing));
    }

    pub fn get_clearing(&self, id: Id) -> Result<Arc<Clearing>, ReferenceStoreError> {
        self.tables.read().clearings.get(&id).cloned().ok_or(ReferenceStoreError::NotFound(id))
    }

    pub fn add_raw_data(&self, kind: impl Into<String>, bytes: Vec<u8>) -> Id {
        let id = self.generator.next();
        let entity = Arc::new(RawData { id, kind: kind.into(), bytes });
        self.tables.write().raw_data.insert(id, entity.clone());
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_raw_data_saved(&entity);
        }
        id
    }

    pub fn restore_raw_data(&self, raw: RawData) {
        self.tables.write().raw_data.insert(raw.id, Arc::new(raw));
    }

    pub fn get_raw_data(&self, id: Id) -> Result<Arc<RawData>, ReferenceStoreError> {
        self.tables.read().raw_data.get(&id).cloned().ok_or(ReferenceStoreError::NotFound(id))
    }

    pub fn add_string(&self, value: impl Into<String>) -> Id {
        let id = self.generator.next();
        let entity = Arc::new(InternedString { id, value: value.into() });
        self.tables.write().strings.insert(id, entity.clone());
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_string_saved(&entity);
        }
        id
    }

    pub fn restore_string(&self, s: InternedString) {
        self.tables.write().strings.insert(s.id, Arc::new(s));
    }

    pub fn get_string(&self, id: Id) -> Result<Arc<InternedString>, ReferenceStoreError> {
        self.tables.read().strings.get(&id).cloned().ok_or(ReferenceStoreError::NotFound(id))
    }
}
