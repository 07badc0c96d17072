//! Producer side of a run: one task per instrument computing indicators and
//! funnelling alerts into the delivery queue.

pub mod fanout;
pub mod message;
pub mod processor;

pub use fanout::run_fan_out;
pub use message::SignalSet;
pub use processor::SymbolProcessor;
