//! Google Workspace API service implementations.

pub mod contacts;
pub mod directory;
pub mod drive;

pub use contacts::ContactsService;
pub use directory::{DirectoryService, MembersService, UsersService};
pub use drive::{DriveService, FilesService};
