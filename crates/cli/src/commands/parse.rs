//! `sam parse` — List the commands in a piece of narrative.

use std::io::Read;
use std::path::Path;

use sam_script::{Command, parse_block, scan};

pub fn run(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input)?
    };

    let mut found = 0;
    let mut malformed = 0;
    for raw in scan(&text) {
        found += 1;
        let span = raw.span();
        match Command::try_from(raw) {
            Ok(command) => println!("  {:>6}..{:<6} {command}", span.start, span.end),
            Err(e) => {
                malformed += 1;
                println!("  {:>6}..{:<6} ⚠️  {e}", span.start, span.end);
            }
        }
    }

    println!();
    println!("{found} commands ({malformed} malformed)");
    if parse_block(&text).is_some() {
        println!("Text carries a state block");
    }
    Ok(())
}
