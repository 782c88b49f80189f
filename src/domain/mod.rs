pub mod engagement;
pub mod messaging;
pub mod notification;
pub mod post;
pub mod realtime;
pub mod social_graph;
pub mod story;
pub mod user;
