use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use lcrf::{Dawg, DawgEntry, LcrfError};

#[derive(Parser, Debug)]
#[command(about = "A program to compile a pattern list into a binary DAWG file.")]
struct Args {
    /// A two-column pattern list: `INFO TOKEN...`, one entry per line
    list: PathBuf,

    /// The binary DAWG file to write
    dawg: PathBuf,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    let f = match File::open(&args.list) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("create_dawg: Error opening '{}': {e}", args.list.display());
            exit(2);
        }
    };

    let start = Instant::now();
    let entries = match load_list(BufReader::new(f)) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("create_dawg: Error: {e}");
            exit(exit_code(&e));
        }
    };
    let loaded = Instant::now();

    let dawg = Dawg::from_entries(entries);
    let built = Instant::now();
    eprintln!(
        "Constructed DAWG: {} states, {} transitions, {} final states",
        dawg.states_count(),
        dawg.transitions_count(),
        dawg.final_states_count()
    );

    let out = match File::create(&args.dawg) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("create_dawg: Error creating '{}': {e}", args.dawg.display());
            exit(2);
        }
    };
    if let Err(e) = dawg.write(BufWriter::new(out)) {
        eprintln!("create_dawg: Error: {e}");
        exit(exit_code(&e));
    }
    let written = Instant::now();

    eprintln!("Wrote DAWG to '{}'", args.dawg.display());
    eprintln!(
        "Reading input list:  {:.0}ms",
        (loaded - start).as_secs_f64() * 1000.0
    );
    eprintln!(
        "Building DAWG:       {:.0}ms",
        (built - loaded).as_secs_f64() * 1000.0
    );
    eprintln!(
        "Writing binary file: {:.0}ms",
        (written - built).as_secs_f64() * 1000.0
    );
}

// `INFO TOKEN...` per line; comments starting with `#` and short lines are
// skipped.
fn load_list<R>(rdr: R) -> lcrf::Result<Vec<DawgEntry>>
where
    R: BufRead,
{
    let mut entries = vec![];
    for line in rdr.lines() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 || fields[0].starts_with('#') {
            continue;
        }
        let info = fields[0].to_string();
        let tokens = fields[1..].iter().map(|t| t.to_string()).collect();
        entries.push((tokens, info));
    }
    Ok(entries)
}

fn exit_code(e: &LcrfError) -> i32 {
    match e {
        LcrfError::IOError(_) => 2,
        LcrfError::InvalidArgument(_) => 1,
        _ => 3,
    }
}
