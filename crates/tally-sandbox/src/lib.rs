//! # tally-sandbox
//!
//! Host side of the agent-script sandbox: a persistent interpreter
//! subprocess driven over full-duplex JSON-RPC 2.0, plus the primitive
//! dispatcher that turns interpreter callbacks into ledger operations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │   Runtime (primitive handlers)           │  journal / chart / vcs
//! ├──────────────────────────────────────────┤
//! │   Bridge (in-flight table, callbacks)    │  JSON-RPC 2.0
//! ├──────────────────────────────────────────┤
//! │   Framing (one JSON object per line)     │  UTF-8, newline-delimited
//! ├──────────────────────────────────────────┤
//! │   Interpreter subprocess (stdin/stdout)  │  sandboxed Monty
//! └──────────────────────────────────────────┘
//! ```
//!
//! Both peers originate requests: the host sends `run`, and a running
//! script calls back into whitelisted primitives. Each originator numbers
//! its own requests, so several scripts can be in flight at once
//! (pipelining) and callbacks are correlated purely by id.
//!
//! The interpreter refuses filesystem, network, subprocess, dynamic-import,
//! `eval`, and `exec` facilities; the host's own enforcement is the
//! `external_functions` whitelist sent with each `run`.

pub mod bridge;
pub mod rpc;
pub mod runtime;

pub use bridge::{Bridge, BridgeConfig, BridgeError, PrimitiveError, PrimitiveHandler};
pub use runtime::{Runtime, RuntimeError};
