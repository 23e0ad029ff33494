use std::env;
use std::fs;

use threadgen::{Generator, ThreadExecutor};

fn create_line_generator(file_content: Result<String, String>) -> Generator<String> {
    Generator::try_on_with(
        move |g| match &file_content {
            Ok(content) => {
                g.yield_all(content.lines().map(|s| String::from(s.trim())));
                Ok(())
            }
            Err(e) => Err(format!("failed to read lines: {}", e)),
        },
        ThreadExecutor::new().with_name_prefix("file-lines"),
    )
}

fn main() {
    let g = create_line_generator(Ok(String::from(
        r#"1 line
    2 line
    3 line
    4 line"#,
    )));

    for s in &g {
        println!("{}", s)
    }

    let lengths: Vec<usize> = g.iter().map(|s| s.len()).collect();
    println!("line lengths: {:?}", lengths);

    let path = env::args().nth(1).unwrap_or_else(|| String::from("Cargo.toml"));
    let g = create_line_generator(fs::read_to_string(&path).map_err(|e| e.to_string()));
    match g.to_vec() {
        Ok(lines) => println!("{} has {} lines", path, lines.len()),
        Err(e) => println!("result: {}", e),
    }

    let g = create_line_generator(Err("".into()));
    println!("result: {:?}", g.to_vec().map(|lines| lines.len()));
}
