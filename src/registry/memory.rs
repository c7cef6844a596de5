//! In-memory service manager used by the coordinator tests.
//!
//! Names compare case-insensitively, as they do in the Windows service manager.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{
    ControlRequest, RegistryEntry, ServiceManagerConnect, ServiceRegistry, ServiceState,
    ServiceStatus,
};
use crate::error::{Result, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    Disconnect,
    List,
    Create(String),
    Open(String),
    Query(String),
    Control(String, ControlRequest),
    Delete(String),
    Start(String),
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, (RegistryEntry, ServiceState)>,
    /// Names reported by `list_names` that cannot be opened.
    listed_only: BTreeSet<String>,
    ops: Vec<(Op, Instant)>,
    open_sessions: usize,
    unavailable: bool,
    reject_stop: bool,
    reject_delete: bool,
}

impl State {
    fn record(&mut self, op: Op) {
        self.ops.push((op, Instant::now()));
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryManager {
    state: Arc<Mutex<State>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert(&self, entry: RegistryEntry, state: ServiceState) {
        self.lock().entries.insert(key(&entry.name), (entry, state));
    }

    /// Makes `list_names` report `name` while `open` still fails with `NotFound`,
    /// as for a registration that is mid-deletion.
    pub fn insert_listed_only(&self, name: &str) {
        self.lock().listed_only.insert(name.to_string());
    }

    pub fn entry(&self, name: &str) -> Option<RegistryEntry> {
        self.lock().entries.get(&key(name)).map(|(entry, _)| entry.clone())
    }

    pub fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.lock().entries.get(&key(name)).map(|(_, state)| *state)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.iter().map(|(op, _)| op.clone()).collect()
    }

    /// Operations that change the persisted registrations.
    pub fn mutations(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Create(_) | Op::Delete(_)))
            .collect()
    }

    /// Time between the first recorded `from` and the first `to` after it.
    pub fn gap(&self, from: &Op, to: &Op) -> Option<Duration> {
        let state = self.lock();
        let start = state.ops.iter().position(|(op, _)| op == from)?;
        let started = state.ops[start].1;
        let (_, ended) = state.ops[start..].iter().find(|(op, _)| op == to)?;
        Some(ended.duration_since(started))
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    pub fn set_unavailable(&self) {
        self.lock().unavailable = true;
    }

    pub fn reject_stop(&self) {
        self.lock().reject_stop = true;
    }

    pub fn reject_delete(&self) {
        self.lock().reject_delete = true;
    }
}

impl ServiceManagerConnect for MemoryManager {
    type Registry = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(ServiceError::ManagerUnavailable("memory manager offline".into()));
        }
        state.record(Op::Connect);
        state.open_sessions += 1;
        drop(state);
        Ok(MemorySession {
            manager: self.clone(),
        })
    }
}

pub struct MemorySession {
    manager: MemoryManager,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut state = self.manager.lock();
        state.record(Op::Disconnect);
        state.open_sessions -= 1;
    }
}

impl ServiceRegistry for MemorySession {
    /// The registered spelling of the service name.
    type Handle = String;

    fn list_names(&self) -> Result<Vec<String>> {
        let mut state = self.manager.lock();
        state.record(Op::List);
        let mut names: Vec<String> = state
            .entries
            .values()
            .map(|(entry, _)| entry.name.clone())
            .collect();
        names.extend(state.listed_only.iter().cloned());
        Ok(names)
    }

    fn create(&self, entry: &RegistryEntry) -> Result<String> {
        let mut state = self.manager.lock();
        if state.entries.contains_key(&key(&entry.name)) {
            return Err(ServiceError::AlreadyExists(entry.name.clone()));
        }
        state.record(Op::Create(entry.name.clone()));
        state
            .entries
            .insert(key(&entry.name), (entry.clone(), ServiceState::Stopped));
        Ok(entry.name.clone())
    }

    fn open(&self, name: &str) -> Result<String> {
        let mut state = self.manager.lock();
        state.record(Op::Open(name.to_string()));
        match state.entries.get(&key(name)) {
            Some((entry, _)) => Ok(entry.name.clone()),
            None => Err(ServiceError::NotFound(name.to_string())),
        }
    }

    fn query(&self, handle: &String) -> Result<ServiceStatus> {
        let mut state = self.manager.lock();
        state.record(Op::Query(handle.clone()));
        let (_, current) = state
            .entries
            .get(&key(handle))
            .ok_or_else(|| ServiceError::NotFound(handle.clone()))?;
        Ok(match current {
            ServiceState::StartPending => ServiceStatus::start_pending(),
            ServiceState::Running => ServiceStatus::running(),
            ServiceState::StopPending => ServiceStatus::stop_pending(),
            ServiceState::Stopped => ServiceStatus::stopped(),
        })
    }

    fn control(&self, handle: &String, signal: ControlRequest) -> Result<()> {
        let mut state = self.manager.lock();
        state.record(Op::Control(handle.clone(), signal));
        if state.reject_stop {
            return Err(ServiceError::InvalidState {
                operation: "stop",
                name: handle.clone(),
            });
        }
        if signal.is_terminal() {
            if let Some((_, current)) = state.entries.get_mut(&key(handle)) {
                *current = ServiceState::Stopped;
            }
        }
        Ok(())
    }

    fn delete(&self, handle: String) -> Result<()> {
        let mut state = self.manager.lock();
        if state.reject_delete {
            return Err(ServiceError::InUse(handle));
        }
        state.record(Op::Delete(handle.clone()));
        match state.entries.remove(&key(&handle)) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(handle)),
        }
    }

    fn start(&self, handle: &String) -> Result<()> {
        let mut state = self.manager.lock();
        state.record(Op::Start(handle.clone()));
        match state.entries.get_mut(&key(handle)) {
            Some((_, current)) => {
                *current = ServiceState::Running;
                Ok(())
            }
            None => Err(ServiceError::NotFound(handle.clone())),
        }
    }
}
