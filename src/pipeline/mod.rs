//! Turn-taking pipeline: conversation state, timers, utterance aggregation,
//! and the coordinator that ties them to the engines.

pub mod aggregator;
pub mod coordinator;
pub mod messages;
pub mod state;
pub mod timer;
