use std::thread;
use std::time::Duration;

use threadgen::Generator;

fn main() {
    // a producer that takes too long to come up with its first value
    let slow = Generator::<u32>::on(|g| {
        while !g.is_stopped() {
            thread::sleep(Duration::from_millis(10));
        }
    });

    let mut iter = slow.iter();
    let handle = iter.cancel_handle();
    let watchdog = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        handle.cancel();
    });

    match iter.has_next() {
        Ok(more) => println!("has next: {}", more),
        Err(e) => println!("gave up: {}", e),
    }
    let _ = watchdog.join();
    println!("worker state: {:?}", iter.worker().state());
}
