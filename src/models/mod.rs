//! Data models
//!
//! Database entities of the archive and the joined views built from them.

mod archive_entry;
mod author;
mod favorite;
mod media;
mod session;
mod tour;
mod user;

pub use archive_entry::{
    ArchiveEntry, EntryListing, EntryStatus, EntrySummary, EntryType, NewArchiveEntry,
};
pub use author::{Author, AuthorRef, Location, LookupItem, NewAuthor, NewLocation};
pub use favorite::{Favorite, FavoriteWithEntry};
pub use media::{MediaFile, MediaRole, NewMediaFile};
pub use session::{PasswordReset, Session};
pub use tour::{Event, NewEvent, Tour, TourStop, TourWithStops};
pub use user::{User, UserRole};
