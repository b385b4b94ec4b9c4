pub mod jobs;
pub mod landing;
pub mod processes;
pub mod queue;
