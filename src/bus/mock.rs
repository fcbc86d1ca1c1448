//! Scriptable mock bus for tests.
//!
//! Devices are scripted up front (identity response, queued read responses,
//! injectable failures) and keep a log of every command sent to them. State
//! sits behind `Arc<Mutex<..>>` so a test can keep a [`MockDeviceHandle`] and
//! inspect traffic after the session has consumed the opened device.

use super::{BusDevice, BusError, InstrumentBus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockDeviceState {
    identity: Option<String>,
    responses: VecDeque<String>,
    sent: Vec<String>,
    fail_next_write: Option<String>,
    fail_next_read: Option<String>,
    fail_on_command: Option<(String, String)>,
    closed: bool,
}

/// Test-side handle to one scripted device's shared state.
#[derive(Clone)]
pub struct MockDeviceHandle {
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockDeviceHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockDeviceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Set the `*IDN?` response. A device without an identity behaves as
    /// unreachable: the identity query times out.
    pub fn identity(&self, identity: &str) -> &Self {
        self.lock().identity = Some(identity.to_string());
        self
    }

    /// Queue one response for the next read.
    pub fn push_response(&self, response: &str) -> &Self {
        self.lock().responses.push_back(response.to_string());
        self
    }

    /// Make the next write fail with the given message.
    pub fn fail_next_write(&self, message: &str) -> &Self {
        self.lock().fail_next_write = Some(message.to_string());
        self
    }

    /// Make the next read fail with the given message.
    pub fn fail_next_read(&self, message: &str) -> &Self {
        self.lock().fail_next_read = Some(message.to_string());
        self
    }

    /// Make the write of one specific command fail with the given message,
    /// leaving all other traffic untouched.
    pub fn fail_on_command(&self, command: &str, message: &str) -> &Self {
        self.lock().fail_on_command = Some((command.to_string(), message.to_string()));
        self
    }

    /// Every command written to the device so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Whether the most recently opened connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// In-memory bus with a fixed, insertion-ordered address list.
#[derive(Default)]
pub struct MockBus {
    devices: Vec<(String, Arc<Mutex<MockDeviceState>>)>,
}

impl MockBus {
    /// Create an empty bus (no reachable addresses).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device at `address` and return its scripting handle.
    pub fn device(&mut self, address: &str) -> MockDeviceHandle {
        let state = Arc::new(Mutex::new(MockDeviceState::default()));
        self.devices.push((address.to_string(), state.clone()));
        MockDeviceHandle { state }
    }
}

impl InstrumentBus for MockBus {
    fn list_addresses(&self) -> Result<Vec<String>, BusError> {
        Ok(self.devices.iter().map(|(addr, _)| addr.clone()).collect())
    }

    fn open(&self, address: &str) -> Result<Box<dyn BusDevice>, BusError> {
        let state = self
            .devices
            .iter()
            .find(|(addr, _)| addr == address)
            .map(|(_, state)| state.clone())
            .ok_or_else(|| BusError::Open {
                address: address.to_string(),
                message: "no such mock device".to_string(),
            })?;
        if let Ok(mut s) = state.lock() {
            s.closed = false;
        }
        Ok(Box::new(MockDevice { state, open: true }))
    }
}

struct MockDevice {
    state: Arc<Mutex<MockDeviceState>>,
    open: bool,
}

impl MockDevice {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockDeviceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl BusDevice for MockDevice {
    fn write(&mut self, command: &str) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        let mut state = self.lock();
        if let Some(message) = state.fail_next_write.take() {
            return Err(BusError::Write(message));
        }
        if state
            .fail_on_command
            .as_ref()
            .is_some_and(|(cmd, _)| cmd.as_str() == command)
        {
            if let Some((_, message)) = state.fail_on_command.take() {
                return Err(BusError::Write(message));
            }
        }
        state.sent.push(command.to_string());
        // An identity query answers immediately, ahead of any pre-scripted
        // measurement responses, and only if the device is reachable
        if command == "*IDN?" {
            if let Some(identity) = state.identity.clone() {
                state.responses.push_front(identity);
            }
        }
        Ok(())
    }

    fn read(&mut self) -> Result<String, BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        let mut state = self.lock();
        if let Some(message) = state.fail_next_read.take() {
            return Err(BusError::Read(message));
        }
        state
            .responses
            .pop_front()
            .ok_or(BusError::Timeout(Duration::from_millis(0)))
    }

    fn close(&mut self) -> Result<(), BusError> {
        self.open = false;
        self.lock().closed = true;
        Ok(())
    }
}
