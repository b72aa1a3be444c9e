//! Joining groups of threads.

use std::thread::JoinHandle;

use tracing::error;

use crate::error::{panic_message, Error};

/// Joins every handle, even after one of them fails.
///
/// A panicked thread does not stop the joining of the rest; the panics
/// are counted and reported once every thread is known to have stopped.
pub fn join_all<E>(handles: Vec<JoinHandle<()>>) -> Result<(), Error<E>> {
    let mut panicked = 0;
    for handle in handles {
        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if let Err(payload) = handle.join() {
            panicked += 1;
            error!(thread = %name, panic = %panic_message(payload.as_ref()), "Thread panicked");
        }
    }
    if panicked == 0 {
        Ok(())
    } else {
        Err(Error::ThreadPanicked { count: panicked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn joins_everything() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handles = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        join_all::<()>(handles).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn panic_does_not_stop_the_rest() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles: Vec<JoinHandle<()>> = vec![thread::spawn(|| panic!("first thread fails"))];
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let err = join_all::<()>(handles).unwrap_err();
        assert!(matches!(err, Error::ThreadPanicked { count: 1 }));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
