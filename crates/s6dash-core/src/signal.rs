//! Key-to-signal table for raw signal sends.
//!
//! Signal numbers come from the platform, so `SIGUSR1` is 10 on Linux and
//! 30 on macOS.

/// A named POSIX signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub name: &'static str,
    pub number: i32,
}

impl Signal {
    const fn new(name: &'static str, number: i32) -> Self {
        Self { name, number }
    }
}

/// Keys that send a signal to the selected service.
pub const SIGNAL_KEYS: [(char, Signal); 12] = [
    ('A', Signal::new("SIGALRM", libc::SIGALRM)),
    ('B', Signal::new("SIGABRT", libc::SIGABRT)),
    ('Q', Signal::new("SIGQUIT", libc::SIGQUIT)),
    ('H', Signal::new("SIGHUP", libc::SIGHUP)),
    ('K', Signal::new("SIGKILL", libc::SIGKILL)),
    ('T', Signal::new("SIGTERM", libc::SIGTERM)),
    ('I', Signal::new("SIGINT", libc::SIGINT)),
    ('1', Signal::new("SIGUSR1", libc::SIGUSR1)),
    ('2', Signal::new("SIGUSR2", libc::SIGUSR2)),
    ('P', Signal::new("SIGSTOP", libc::SIGSTOP)),
    ('C', Signal::new("SIGCONT", libc::SIGCONT)),
    ('Y', Signal::new("SIGWINCH", libc::SIGWINCH)),
];

/// Look up the signal bound to a key.
pub fn signal_for_key(key: char) -> Option<Signal> {
    SIGNAL_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, sig)| *sig)
}
