//! Small runtime-abstraction types shared by the pool, connections, and
//! protocol engines.

pub(crate) mod exec;
pub(crate) mod time;

pub use exec::Executor;
pub(crate) use exec::Exec;
pub(crate) use time::now;
