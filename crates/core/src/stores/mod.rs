pub mod local;
pub mod remote;

pub use local::{cosine_similarity, LocalIndex};
pub use remote::{RemoteConfig, RemoteIndex};
