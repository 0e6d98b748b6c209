mod clock;
pub mod env;
mod memory;
mod network;
mod ui;

pub mod testing;

pub use clock::{Clock, SystemClock};
pub use memory::{HostMemory, InMemoryHost, MemoryEntry, MemoryValue, ValueKind};
pub use network::{HttpTransport, NetworkRequest, NetworkResponse, Transport};
pub use ui::{InspectionUi, NeverVisible};
