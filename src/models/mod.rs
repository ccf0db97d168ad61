pub mod comment;
pub mod media;
pub mod post;
pub mod user;
pub mod vote;

pub use comment::*;
pub use media::*;
pub use post::*;
pub use user::*;
pub use vote::*;
