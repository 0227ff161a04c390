mod user;

pub use user::{CreateDriveUser, DriveUser};
