//! Background tasks of the bridge
//!
//! ```text
//!   ┌──────────────────────┐  SessionEvent   ┌──────────────────────┐
//!   │  ConnectionDriver    │ ──────────────▶ │  Session             │
//!   │  (event loop task)   │   (unbounded)   │  (command task)      │
//!   └──────────▲───────────┘                 └──────────┬───────────┘
//!              │ drains                                 │ status (watch)
//!              │                                        ▼
//!              │                             ┌──────────────────────┐
//!              │                             │  SamplerActor        │
//!              │                             │  (ticker task)       │
//!              │                             └──────────┬───────────┘
//!        ┌─────┴──────────────── AsyncClient ───────────┴────────┐
//!        │   request queue, publishes from session and sampler   │
//!        └───────────────────────────────────────────────────────┘
//! ```
//!
//! The driver only polls; it never waits on the request queue it drains.
//! The session is the only task that runs commands, one at a time. The
//! sampler is controlled through an mpsc command channel and exits on
//! `Shutdown`.

pub mod messages;
pub mod sampler;
