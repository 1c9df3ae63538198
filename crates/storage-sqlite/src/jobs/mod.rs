mod model;
mod repository;

pub use model::JobCursorDB;
pub use repository::JobCursorRepository;
