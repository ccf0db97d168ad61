pub mod auth_service;
pub mod background_jobs;
pub mod comment_service;
pub mod email_service;
pub mod post_service;
pub mod upload_service;
pub mod user_service;
pub mod vote_service;
