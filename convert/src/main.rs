use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use lcrf::{dump, LcrfError};

#[derive(Parser, Debug)]
#[command(about = "A program to convert a first-order text model dump into a binary model.")]
struct Args {
    /// The text model dump to read
    text_model: PathBuf,

    /// The binary model file to write
    binary_model: PathBuf,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    let f = match File::open(&args.text_model) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "convert: Error: Could not open model file '{}': {e}",
                args.text_model.display()
            );
            exit(2);
        }
    };

    eprintln!("Reading text model...");
    let model = match dump::read_text_model(BufReader::new(f)) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("convert: Error: {e}");
            exit(exit_code(&e));
        }
    };
    let meta = model.meta_data();
    eprintln!(
        "[{} labels, {} attributes, {} features, {} transitions, {} parameters, {} non-null]",
        meta.num_labels,
        meta.num_attributes,
        meta.num_features,
        meta.num_transitions,
        meta.num_parameters,
        meta.num_non_null_parameters
    );

    eprintln!("Writing binary model...");
    let out = match File::create(&args.binary_model) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "convert: Error: Could not create '{}': {e}",
                args.binary_model.display()
            );
            exit(2);
        }
    };
    if let Err(e) = model.write(BufWriter::new(out)) {
        eprintln!("convert: Error: {e}");
        exit(exit_code(&e));
    }
    eprintln!("done");
}

fn exit_code(e: &LcrfError) -> i32 {
    match e {
        LcrfError::IOError(_) => 2,
        LcrfError::InvalidArgument(_) => 1,
        _ => 3,
    }
}
