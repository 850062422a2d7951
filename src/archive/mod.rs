pub mod codec;
mod format;
mod reader;
mod record;
mod writer;

pub use format::{
    skip_padding, Header, RecordHeader, FLAGS_OFFSET, FORMAT_VERSION, HEADER_SIZE, MAGIC_NUMBER,
    RECORD_HEADER_SIZE,
};
pub use reader::PackageIndex;
pub use record::FileRecord;
pub use writer::{Encoder, FileToEncode};
