//! Mock file standing in for the byte source and sink of readers and writers.
use mockall::mock;

use std::io::{self, Read, Write};

mock! {
    pub File {}
    impl Read for File {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    }
    impl Write for File {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
        fn flush(&mut self) -> io::Result<()>;
    }
}
