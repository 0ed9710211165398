//! Database repositories
//!
//! One repository trait per table, each with a `Sqlx*Repository`
//! implementation covering SQLite and MySQL.

pub mod archive_entry;
pub mod author;
pub mod event;
pub mod favorite;
pub mod location;
pub mod media_file;
pub mod session;
pub mod tour;
pub mod user;

pub use archive_entry::{ArchiveEntryRepository, SqlxArchiveEntryRepository};
pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use favorite::{FavoriteRepository, SqlxFavoriteRepository};
pub use location::{LocationRepository, SqlxLocationRepository};
pub use media_file::{MediaFileRepository, SqlxMediaFileRepository};
pub use session::{
    PasswordResetRepository, SessionRepository, SqlxPasswordResetRepository,
    SqlxSessionRepository,
};
pub use tour::{SqlxTourRepository, TourRepository};
pub use user::{SqlxUserRepository, UserRepository};
