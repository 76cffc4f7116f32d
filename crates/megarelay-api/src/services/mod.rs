//! Request-scoped service logic sitting between the handlers and the
//! storage gateway.

pub mod link;
pub mod session;
