// Storage adapters behind the `CommentStore` port.

pub mod memory;
pub mod mysql;

pub use memory::{CommentRow, MemoryStore};
pub use mysql::MySqlCommentStore;
