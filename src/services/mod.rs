pub mod player;
pub mod recorder;

pub use player::RodioPlayer;
pub use recorder::RecorderHandle;
