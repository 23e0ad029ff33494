extern crate threadgen;
use threadgen::Generator;

fn main() {
    for f in Generator::on(|g| {
        let mut current = (0_u64, 1_u64);
        loop {
            g.value(current.0);
            current = (current.1, current.0 + current.1);
        }
    })
    .iter()
    .take(42)
    {
        println!("{}", f)
    }
}
