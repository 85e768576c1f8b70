pub mod admin;
pub mod api;
pub mod auth;
pub mod event_source;
pub mod library;
pub mod notification;
pub mod panic_handler;
pub mod prompt;
pub mod reader;
pub mod reader_app;
pub mod settings;
pub mod theme;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use reader_app::{AppAction, BookmarkSink, ReaderApp, run_reader_with_event_source};
