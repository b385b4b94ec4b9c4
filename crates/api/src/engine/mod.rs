//! Request dispatch: turns a validated request into a queued job and, for
//! synchronous callers, waits a bounded time for its outcome.

pub mod dispatcher;
