//
// cancel.rs
// Image-Tools-rs
//
// One-way cooperative cancellation flag plus the background listener that raises it from a keystroke.
//

use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// Escape key, the default sentinel that stops a running batch.
pub const ESCAPE: u8 = 0x1b;

/// Shared flag that starts unset and flips to set exactly once.
///
/// Clones observe the same flag. Readers only gate the start of new work with it;
/// nothing already running is interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Spawn a thread that reads `input` byte by byte and cancels `token` when `sentinel` shows up.
///
/// The listener stops after the first sentinel, at end of input, or on a read error.
/// End of input is not treated as a cancellation request.
pub fn spawn_key_listener<R>(
    input: R,
    token: CancellationToken,
    sentinel: u8,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("cancel-listener".into())
        .spawn(move || listen(input, &token, sentinel))
}

fn listen<R: Read>(mut input: R, token: &CancellationToken, sentinel: u8) {
    let mut byte = [0u8; 1];
    loop {
        match input.read(&mut byte) {
            Ok(0) => {
                debug!("cancel listener reached end of input");
                return;
            }
            Ok(_) if byte[0] == sentinel => {
                if token.cancel() {
                    warn!("cancellation requested, no new files will be started");
                }
                return;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("cancel listener stopped: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn cancel_transitions_once() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(observer.is_cancelled());
    }

    #[test]
    fn listener_cancels_on_sentinel() {
        let token = CancellationToken::new();
        let input = Cursor::new(b"abc\x1bdef".to_vec());
        spawn_key_listener(input, token.clone(), ESCAPE)
            .expect("spawn")
            .join()
            .expect("join");
        assert!(token.is_cancelled());
    }

    #[test]
    fn listener_ignores_end_of_input() {
        let token = CancellationToken::new();
        let input = Cursor::new(b"just text\n".to_vec());
        spawn_key_listener(input, token.clone(), ESCAPE)
            .expect("spawn")
            .join()
            .expect("join");
        assert!(!token.is_cancelled());
    }

    #[test]
    fn listener_honours_custom_sentinel() {
        let token = CancellationToken::new();
        spawn_key_listener(Cursor::new(b"xq".to_vec()), token.clone(), b'q')
            .expect("spawn")
            .join()
            .expect("join");
        assert!(token.is_cancelled());
    }
}
