mod model;
mod repository;

pub use model::SnapshotDB;
pub use repository::SnapshotRepository;
