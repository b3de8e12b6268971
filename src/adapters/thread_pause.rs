//! Blocking pause backed by `std::thread::sleep`.

use crate::ports::pause_port::PausePort;
use std::time::Duration;

pub struct ThreadPause;

impl PausePort for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
