//! Heavy render scheduling
//!
//! Big and ultra renders are not computed on the request path. They are
//! queued to a single background worker which serves them strictly in arrival
//! order, paying a fixed simulated cost before each render. This is the only
//! throttle on expensive work; the queue itself is unbounded and back-pressure
//! comes from the front door's admission ceiling.
//!
//! The subsystem has two parts:
//! - `HeavyRequestScheduler`: cloneable producer handle used by request tasks
//! - `HeavyWorker`: the single consumer loop

pub mod scheduler;
pub mod types;

pub use scheduler::{HeavyRequestScheduler, HeavyWorker};
pub use types::*;
