mod config;
mod playback;
mod queuing;
mod time;
mod util;

pub use config::*;
pub use playback::*;
pub use queuing::*;
pub use time::*;
pub use util::*;
