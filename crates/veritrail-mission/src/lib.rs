//! # veritrail-mission
//!
//! The bounded decide-and-act loop.
//!
//! Each step asks a [`veritrail_core::Brain`] what to do, records its raw
//! answer as a `THOUGHT`, parses it permissively, and dispatches the named
//! tool through an audited wrapper.  Tool failures, timeouts, and brain
//! transport errors become `ERROR` events and the loop moves on; only an
//! answer that cannot be decoded at all halts the run.
//!
//! ```rust,ignore
//! let mission = MissionLoop::new(recorder.clone(), brain, registry)
//!     .with_config(config.mission);
//! let outcome = mission.run("Check the balance, then stop").await;
//! println!("{:?} after {} steps, root {}", outcome.status, outcome.steps, outcome.final_root);
//! ```

pub mod decision;
pub mod mission;
pub mod prompt;

pub use decision::{parse_decision, Decision, DecisionError};
pub use mission::{MissionLoop, MissionOutcome, MissionStatus};
