use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use threadgen::{Executor, Generator, GeneratorError, GeneratorIterator, Task, TaskHandle, ThreadExecutor, WorkerState};

fn wait_worker_done<T>(iter: &GeneratorIterator<T>) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !iter.worker().is_done() {
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}

/// Spawns plain threads and counts submissions
#[derive(Default)]
struct CountingExecutor {
    submitted: AtomicUsize,
}

struct JoinedHandle(Arc<AtomicUsize>);

impl TaskHandle for JoinedHandle {
    fn cancel(&self, _interrupt_if_running: bool) -> bool {
        !self.is_done()
    }

    fn is_done(&self) -> bool {
        self.0.load(Ordering::Acquire) == 1
    }
}

impl Executor for CountingExecutor {
    fn submit(&self, task: Task) -> io::Result<Box<dyn TaskHandle>> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        thread::Builder::new().name("counting".into()).spawn(move || {
            task();
            flag.store(1, Ordering::Release);
        })?;
        Ok(Box::new(JoinedHandle(done)))
    }
}

#[test]
fn generator_should_produce_values() {
    let generator = Generator::on(|y| {
        y.value(1);
        y.value(2);
        y.value(3);
    });

    let mut ints = generator.iter();
    assert_eq!(ints.try_next().unwrap(), 1);
    assert_eq!(ints.try_next().unwrap(), 2);
    assert_eq!(ints.try_next().unwrap(), 3);
    assert!(!ints.has_next().unwrap());
}

#[test]
fn generator_should_be_iterable() {
    let generator = Generator::on(|y| {
        y.value("value");
    });

    let mut seen = 0;
    for s in &generator {
        assert_eq!(s, "value");
        seen += 1;
    }
    assert_eq!(seen, 1);
}

#[test]
fn generator_should_not_infinitely_loop() {
    let generator = Generator::on(|y| loop {
        y.value("value");
    });

    let mut iter = generator.iter();
    let taken: Vec<_> = iter.by_ref().take(10).collect();
    assert_eq!(taken, vec!["value"; 10]);
    iter.close();
    assert_eq!(iter.worker().state(), WorkerState::Cancelled);
    assert!(wait_worker_done(&iter));
}

#[test]
fn end_truncates_sequence() {
    let generator = Generator::on(|y| {
        for v in vec![1, 2, 3, 5] {
            if v == 5 {
                y.end();
            }
            y.value(v);
        }
    });

    assert_eq!(generator.to_vec().unwrap(), vec![1, 2, 3]);
}

#[test]
fn empty_producer() {
    let generator = Generator::<i32>::on(|_| {});

    let mut iter = generator.iter();
    assert!(!iter.has_next().unwrap());
    assert!(matches!(iter.try_next(), Err(GeneratorError::Exhausted)));
    assert!(iter.next().is_none());
}

#[test]
fn custom_executor_matches_default() {
    let routine = |y: &mut threadgen::Yielder<String>| {
        for word in "the quick brown fox".split_whitespace() {
            y.value(word.to_uppercase());
        }
    };
    let executor = Arc::new(CountingExecutor::default());

    let default = Generator::on(routine).to_vec().unwrap();
    let custom = Generator::on_with(routine, Arc::clone(&executor)).to_vec().unwrap();

    assert_eq!(default, custom);
    assert_eq!(custom, vec!["THE", "QUICK", "BROWN", "FOX"]);
    assert_eq!(executor.submitted.load(Ordering::SeqCst), 1);
}

#[test]
fn repeated_has_next_does_not_skip() {
    let generator = Generator::on(|y| {
        y.yield_all(1..=4);
    });

    let mut iter = generator.iter();
    let mut seen = Vec::new();
    while iter.has_next().unwrap() {
        assert!(iter.has_next().unwrap());
        seen.push(iter.try_next().unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);
}

#[test]
fn producer_panic_is_surfaced() {
    let generator = Generator::on(|y| {
        y.value(1);
        panic!("producer gave up");
    });

    let mut iter = generator.iter();
    assert_eq!(iter.try_next().unwrap(), 1);
    match iter.try_next() {
        Err(GeneratorError::ProducerFailed(failure)) => assert_eq!(failure.message(), "producer gave up"),
        other => panic!("expected producer failure, got {:?}", other),
    }
    assert!(!iter.has_next().unwrap());
}

#[test]
fn producer_panic_resumes_in_iterator() {
    let generator = Generator::<u8>::on(|_| panic!("boom"));

    let caught = catch_unwind(AssertUnwindSafe(|| generator.iter().collect::<Vec<_>>()));
    let payload = caught.unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
}

#[test]
fn producer_error_fails_to_vec() {
    let generator = Generator::try_on(|y| -> Result<(), io::Error> {
        y.value(1);
        Err(io::Error::new(io::ErrorKind::NotFound, "missing input"))
    });

    match generator.to_vec() {
        Err(GeneratorError::ProducerFailed(failure)) => assert_eq!(failure.message(), "missing input"),
        other => panic!("expected producer failure, got {:?}", other),
    }
}

#[test]
fn dropping_iterator_releases_worker() {
    let executor = ThreadExecutor::new().with_name_prefix("drop-test");
    let generator = Generator::on_with(
        |y| {
            let mut n = 0_u64;
            loop {
                y.value(n);
                n += 1;
            }
        },
        executor.clone(),
    );

    let first: Vec<u64> = generator.iter().take(3).collect();
    let second: Vec<u64> = generator.iter().take(5).collect();
    assert_eq!(first, vec![0, 1, 2]);
    assert_eq!(second, vec![0, 1, 2, 3, 4]);
    assert_eq!(executor.spawned(), 2);
}

#[test]
fn end_inside_endless_loop_finishes_session() {
    let generator = Generator::on(|y| {
        let mut n = 0;
        loop {
            if n == 4 {
                y.end();
            }
            y.value(n);
            n += 1;
        }
    });

    let mut iter = generator.iter();
    let values: Vec<i32> = iter.by_ref().collect();
    assert_eq!(values, vec![0, 1, 2, 3]);
    assert_eq!(iter.worker().state(), WorkerState::Finished);
    assert!(wait_worker_done(&iter));
}

struct RejectingExecutor;

impl Executor for RejectingExecutor {
    fn submit(&self, _task: Task) -> io::Result<Box<dyn TaskHandle>> {
        Err(io::Error::new(io::ErrorKind::Other, "pool is shut down"))
    }
}

#[test]
#[should_panic(expected = "failed to submit generator worker")]
fn rejected_submit_panics_in_iterator() {
    let generator = Generator::on_with(|y| y.value(1), RejectingExecutor);
    let _ = generator.iter().next();
}

#[test]
fn rejected_submit_is_an_error_for_try_next() {
    let generator = Generator::on_with(|y| y.value(1), RejectingExecutor);
    let mut iter = generator.iter();
    assert!(matches!(iter.try_next(), Err(GeneratorError::Submit(_))));
    assert_eq!(iter.worker().state(), WorkerState::Failed);
}
