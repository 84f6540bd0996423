pub(crate) mod bootstrap;
mod data;
pub(crate) mod loop_runner;
mod session;
mod states;
