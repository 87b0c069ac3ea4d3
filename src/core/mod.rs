/// Reader, processor and writer abstractions shared by every row source and sink.
pub mod item;

/// Chunked copy of items from a reader to a writer.
pub mod step;
