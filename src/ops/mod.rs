//! high-level operations on sprig repositories

mod commit;
mod diff;
mod export;
mod fsck;
mod log;
mod ls_tree;

pub use commit::{commit, commit_all, CommitOptions};
pub use diff::{diff, diff_trees};
pub use export::{export, export_path, export_tree, ExportOptions, ExportStats};
pub use fsck::{fsck, CorruptObject, FsckReport, MissingObject, ObjectType};
pub use log::{log, resolve_changeset, LogEntry};
pub use ls_tree::{ls_tree, ls_tree_recursive, manifest, LsTreeEntry};
