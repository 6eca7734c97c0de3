pub mod cli;
pub mod config;
pub mod publish_host;
pub mod scene;
pub mod session;

pub use config::Config;
pub use publish_host::{PublishHost, PublishReport};
pub use scene::{SceneNode, SceneSnapshot};
pub use session::{load_request, PublishRequest};
