use std::time::Duration;

/// Configuration shared by the rooms of a partyqueue instance
#[derive(Debug, Clone)]
pub struct Config {
    /// How often rooms are checked for a finished song
    pub finish_check_interval: Duration,
    /// The length of generated room ids
    pub room_id_length: usize,
    /// The length of generated host credentials
    pub host_token_length: usize,
}

impl Config {
    /// Returns a config with the given finish check interval in milliseconds
    pub fn with_finish_check_millis(mut self, millis: u64) -> Self {
        self.finish_check_interval = Duration::from_millis(millis.max(1));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Songs end at most a quarter second late
            finish_check_interval: Duration::from_millis(250),
            room_id_length: 6,
            host_token_length: 32,
        }
    }
}
