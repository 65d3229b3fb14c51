//! Secrets admission — validates a workload's secrets-cluster references
//! before the workload enters scheduling.
//!
//! Rejects submissions that reference disabled clusters, omit a required
//! credential, or carry a credential lacking the namespaces or policies the
//! workload declares. Holds no state between calls.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod config;
pub mod logging;
pub mod token;
pub mod workload;
