//! Job-card aggregation sidecar for the lab portal: decodes backend
//! payloads, folds per-parameter rows into per-report job cards, and serves
//! the grouped view over a JSON-lines request loop.

pub mod aggregate;
pub mod decode;
pub mod ipc;
pub mod lookup;
