//! Services layer - Business logic
//!
//! Services validate input, resolve relations, call repositories and
//! translate failures into typed errors for the API layer. Every write is
//! validated completely before the first repository call.

pub mod archive;
pub mod email;
pub mod entities;
pub mod event;
pub mod favorite;
pub mod filter;
pub mod form;
pub mod lookup;
pub mod map;
pub mod media;
pub mod password;
pub mod rate_limiter;
pub mod tour;
pub mod user;

pub use archive::{
    ArchiveService, ArchiveServiceError, CoverUpload, EntryDetail, EntryInput, ResubmitInput,
};
pub use email::{Delivery, EmailService};
pub use entities::{AuthorChoice, EntityError, EntityService, LocationChoice};
pub use event::{EventService, EventServiceError};
pub use favorite::{FavoriteService, FavoriteServiceError};
pub use filter::{ArchiveFilter, SortOrder};
pub use form::{parse_comma_list, parse_keyword_field, round_mb, trimmed_or_none};
pub use lookup::{LookupError, LookupService, LookupTable};
pub use map::{MapService, MapView};
pub use media::{select_cover_media, MediaService, MediaServiceError};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use tour::{TourInput, TourService, TourServiceError};
pub use user::{RegisterInput, UserService, UserServiceError};
