use std::panic::{catch_unwind, AssertUnwindSafe};

use threadgen::{Generator, GeneratorError};

fn main() {
    let g = Generator::on(|g| {
        g.value(0);
        g.yield_all(1..3);
        unimplemented!()
    });

    let mut iter = g.iter();
    loop {
        match iter.try_next() {
            Ok(i) => println!("value {}", i),
            Err(GeneratorError::ProducerFailed(failure)) => {
                println!("producer failed: {}", failure);
                break;
            }
            Err(e) => {
                println!("stopped: {}", e);
                break;
            }
        }
    }

    let catch_result = catch_unwind(AssertUnwindSafe(|| {
        for i in &g {
            println!("value {}", i)
        }
    }));
    println!("plain iteration re-raised the panic: {}", catch_result.is_err());
}
