use crate::Error;
use crossbeam_channel::Sender;
use std::num::NonZeroU8;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

/// Runs `producer` on the current thread, and `num_threads` copies of `worker` fed with what it sends.
///
/// The first error (from either side) stops the workers from taking more jobs,
/// and is returned once all of them have finished. Worker panics become [`Error::ThreadSend`].
pub fn new<P, W, J, R>(num_threads: NonZeroU8, name: &str, producer: P, mut worker: W) -> Result<R, Error> where
    J: Send,
    W: Clone + Send + FnMut(J) -> Result<(), Error>,
    P: FnOnce(Sender<J>) -> Result<R, Error>,
{
    let failed = &AtomicBool::new(false);
    std::thread::scope(move |scope| {
        let (s, r) = crossbeam_channel::bounded(num_threads.get().into());
        let thread = move || {
            // a panicking job leaves nothing behind that other jobs could observe
            catch_unwind(AssertUnwindSafe(move || {
                for job in r {
                    if failed.load(SeqCst) {
                        break;
                    }
                    if let Err(e) = worker(job) {
                        failed.store(true, SeqCst);
                        return Err(e);
                    }
                }
                Ok(())
            })).map_err(move |_| {
                failed.store(true, SeqCst);
                Error::ThreadSend
            })?
        };
        let spawn = move |n, thread| {
            std::thread::Builder::new().name(format!("{name}{n}")).spawn_scoped(scope, thread).map_err(|_| {
                failed.store(true, SeqCst);
                Error::ThreadSend
            })
        };
        let num_threads = num_threads.get();
        let mut handles = Vec::with_capacity(num_threads.into());
        for n in 0..num_threads-1 {
            handles.push(spawn(n, thread.clone())?);
        }
        handles.push(spawn(num_threads-1, thread)?);

        let res = producer(s).map_err(|e| {
            failed.store(true, SeqCst);
            e
        });
        // worker errors are the real cause; a producer error is then just a closed channel
        handles.into_iter().try_for_each(|h| h.join().map_err(|_| Error::ThreadSend)?)?;
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn threads(n: u8) -> NonZeroU8 {
        NonZeroU8::new(n).unwrap()
    }

    #[test]
    fn runs_every_job() {
        let sum = AtomicUsize::new(0);
        let sent = new(threads(3), "test", |s| {
            for n in 1..=100 {
                s.send(n)?;
            }
            Ok(100)
        }, |n: usize| {
            sum.fetch_add(n, SeqCst);
            Ok(())
        }).unwrap();
        assert_eq!(sent, 100);
        assert_eq!(sum.load(SeqCst), 5050);
    }

    #[test]
    fn first_error_stops_the_rest() {
        let done = AtomicUsize::new(0);
        let res = new(threads(1), "test", |s| {
            for n in 0..100 {
                s.send(n)?;
            }
            Ok(())
        }, |n: usize| {
            if n == 3 {
                return Err(Error::Config("job 3".into()));
            }
            done.fetch_add(1, SeqCst);
            Ok(())
        });
        assert!(matches!(res, Err(Error::Config(msg)) if msg == "job 3"));
        assert_eq!(done.load(SeqCst), 3);
    }

    #[test]
    fn panic_is_an_error() {
        let res = new(threads(2), "test", |s| {
            s.send(1)?;
            Ok(())
        }, |_: u32| -> Result<(), Error> {
            panic!("worker died");
        });
        assert!(matches!(res, Err(Error::ThreadSend)));
    }
}
