// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] defines the `ExecutorBackend` trait.
//! - [`local`] is the host backend: one working directory per task.
//! - [`executor_loop`] owns the worker tasks that drain the request queue,
//!   consult the cache and report back through the result queue.

pub mod backend;
pub mod executor_loop;
pub mod local;

pub use backend::{ExecutorBackend, RunFuture};
pub use executor_loop::Executor;
pub use local::LocalExecutor;
