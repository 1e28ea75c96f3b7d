pub mod file;
pub mod user;

pub use file::FileService;
pub use user::UserService;
