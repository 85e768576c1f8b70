pub mod reader_view;

pub use reader_view::ReaderView;
