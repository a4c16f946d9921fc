//! Subsystem modules for the lesson hub.

pub mod agents;
pub mod assembler;
pub mod comms;
pub mod router;
pub mod storage;
