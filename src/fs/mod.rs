pub mod read;
pub mod write;

pub use read::{file_type, hash_content, read_content, read_symlink_target, FileType};
pub use write::{create_directory, create_symlink, fsync_dir, walk_error, write_file};
