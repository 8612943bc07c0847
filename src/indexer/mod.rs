pub mod event_parser;
pub mod event_watcher;

pub use event_parser::{ChainEvent, EventParser, LoggedEvent};
pub use event_watcher::EventWatcher;
