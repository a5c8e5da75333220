//! Team directory: channels, private groups, users and direct-message links
//!
//! Collections are populated wholesale, either from the session snapshot or
//! lazily by the first lookup that needs them, and are never invalidated.
//!
//! Key behaviors:
//! - Duplicate names inside one collection resolve to the last listed entry
//! - Bare names are searched channel, then group, then user
//! - A single leading `#` or `@` is ignored when resolving

mod cache;
mod collection;
mod resolver;
mod types;

pub use cache::{CacheStats, DirectoryCache};
pub use collection::Collection;
pub use resolver::{NameResolver, Resolved, clean_name};
pub use types::{
    CollectionKind, DirectMessageLink, DirectoryEntry, EntryDetails, EntryKind, parse_entries,
    parse_links,
};
