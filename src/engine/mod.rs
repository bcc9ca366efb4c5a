// src/engine/mod.rs

//! Run orchestration and log tailing.
//!
//! This module ties together:
//! - log stream addressing ([`stream`])
//! - per-container log tailers ([`tailer`])
//! - finish markers written once a container is observed stopped ([`marker`])
//! - the run state machine that submits, waits, finalizes and joins
//!   ([`runtime`])
//!
//! The pure pieces (phases, sentinel predicate, exit-code aggregation) live in
//! [`core`]; the async/IO shell is [`runtime::RunOrchestrator`].

pub mod core;
pub mod marker;
pub mod runtime;
pub mod stream;
pub mod tailer;

pub use self::core::{RunPhase, RunResult, aggregate_exit_code, generated_stream_prefix, sentinel_predicate};
pub use marker::{FinishMarkerWriter, finish_marker, sentinel_prefix};
pub use runtime::{RunOptions, RunOrchestrator, RunRequest};
pub use stream::{LogStreamRef, short_id};
pub use tailer::{LogTailer, OutputSink, StdoutSink, TailExit};
