//! Handler Registry
//!
//! Each key (a resource name such as `file` or `service`) owns a bucket of
//! handlers kept in preference order.
//!
//! ## Architecture
//!
//! ```text
//!   register / PriorityMap::apply           resolve / candidates
//!              │                                     │
//!              ▼                                     ▼
//!    ┌────────────────────────────────────────────────────────┐
//!    │                     Registry<H>                        │
//!    │                                                        │
//!    │  "file"    → [ Linux(os) , CustomFile , File ]         │
//!    │  "service" → [ Systemd(action,platform) , Sysvinit ]   │
//!    │                                                        │
//!    │  1. most specific first                                │
//!    │  2. equal specificity: latest registration first       │
//!    │  3. first handler whose filters + hooks accept wins    │
//!    └────────────────────────────────────────────────────────┘
//! ```

mod handler_registry;
mod priority;

pub use handler_registry::{Registry, RegistryStats};
pub use priority::PriorityMap;
