//! Deterministic capability doubles for tests and simulations.

use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::clock::Clock;
use crate::network::{NetworkRequest, NetworkResponse, Transport};
use crate::ui::InspectionUi;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ManualClockState {
    monotonic: Duration,
    wall: Duration,
    auto_advance: Duration,
    slept: Vec<Duration>,
}

/// Clock that only moves when told to.
///
/// With a non-zero auto-advance step every monotonic or wall reading moves
/// both clocks forward by that step first, so any measured interval between
/// two readings equals the step.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(wall_unix_millis: u64) -> Self {
        let clock = Self::default();
        lock(&clock.state).wall = Duration::from_millis(wall_unix_millis);
        clock
    }

    pub fn advance(&self, by: Duration) {
        let mut state = lock(&self.state);
        state.monotonic += by;
        state.wall += by;
    }

    /// Moves the wall clock only, leaving monotonic time untouched.
    pub fn skew_wall(&self, by: Duration) {
        lock(&self.state).wall += by;
    }

    pub fn set_auto_advance(&self, step: Duration) {
        lock(&self.state).auto_advance = step;
    }

    pub fn slept(&self) -> Vec<Duration> {
        lock(&self.state).slept.clone()
    }

    fn tick(state: &mut ManualClockState) {
        let step = state.auto_advance;
        if step.is_zero() {
            return;
        }
        state.monotonic += step;
        state.wall += step;
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        let mut state = lock(&self.state);
        Self::tick(&mut state);
        state.monotonic
    }

    fn wall(&self) -> Duration {
        let mut state = lock(&self.state);
        Self::tick(&mut state);
        state.wall
    }

    fn sleep(&self, duration: Duration) {
        let mut state = lock(&self.state);
        state.slept.push(duration);
        state.monotonic += duration;
        state.wall += duration;
    }
}

#[derive(Debug, Clone)]
enum ScriptedReply {
    Status(u16),
    Error(String),
}

#[derive(Debug)]
struct MockTransportState {
    requests: Vec<NetworkRequest>,
    reply: ScriptedReply,
}

/// Transport that records every request and answers with a scripted reply.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockTransportState {
                requests: Vec::new(),
                reply: ScriptedReply::Status(200),
            })),
        }
    }

    pub fn respond_with(&self, status: u16) {
        lock(&self.state).reply = ScriptedReply::Status(status);
    }

    pub fn fail_with(&self, detail: &str) {
        lock(&self.state).reply = ScriptedReply::Error(detail.to_string());
    }

    pub fn requests(&self) -> Vec<NetworkRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &NetworkRequest) -> Result<NetworkResponse> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        match &state.reply {
            ScriptedReply::Status(status) => Ok(NetworkResponse {
                status: *status,
                body: String::new(),
            }),
            ScriptedReply::Error(detail) => Err(anyhow!("{}", detail)),
        }
    }
}

/// Inspection UI whose visibility the test flips by hand.
#[derive(Debug, Default)]
pub struct ToggleUi {
    visible: Cell<bool>,
}

impl ToggleUi {
    pub fn new(visible: bool) -> Self {
        Self {
            visible: Cell::new(visible),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }
}

impl InspectionUi for ToggleUi {
    fn is_visible(&self) -> bool {
        self.visible.get()
    }
}
