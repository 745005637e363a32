//! External service integrations.

pub mod fsm;
