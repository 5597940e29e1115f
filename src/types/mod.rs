mod changeset;
mod diff;
mod treenode;

pub use changeset::Changeset;
pub use diff::{Change, ChangeKind, DiffEntry};
pub(crate) use treenode::validate_entry_name;
pub use treenode::{EntryType, Gid, Treenode, TreenodeEntry};
