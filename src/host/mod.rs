//! Out-of-process host integration: the wire contract and the stdio bridge.

pub mod contract;
pub mod stdio;
