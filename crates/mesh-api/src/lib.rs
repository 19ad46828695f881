pub mod auth;
pub mod comment_tree;
pub mod comments;
pub mod convert;
pub mod error;
pub mod fanout;
pub mod feed;
pub mod gateway;
pub mod mentions;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod routes;
pub mod state;
pub mod users;

pub use routes::router;
pub use state::{AppState, AppStateInner};
