//! Concrete implementations of the core collaborator traits: external
//! programs, the HTTP dashboard and the mount table.

pub mod capture;
pub mod command;
pub mod dashboard;
pub mod hazard;
pub mod scanner;
pub mod storage;
pub mod upload;

pub use capture::CommandCapture;
pub use dashboard::HttpDashboard;
pub use hazard::CommandHazardFeed;
pub use scanner::CommandScanner;
pub use storage::MountedStorage;
pub use upload::CommandUploader;
