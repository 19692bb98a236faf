use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use lcrf::{
    AnnotationScheme, CrfConfiguration, FeatureExtractor, LcrfError, SentenceReader, TokenWithTag,
};

#[derive(Parser, Debug)]
#[command(about = "A program to annotate (+- annotated) texts for CRF training.")]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feature groups to generate, e.g. "AllWords|AllPrefixes"
    #[arg(short, long)]
    features: Option<String>,

    /// Running text input (as opposed to tab-separated column data)
    #[arg(short, long)]
    running_text: bool,

    /// Prepend the token to each output line
    #[arg(short = 't', long)]
    output_token: bool,

    /// Annotation scheme: {bio, bilou}
    #[arg(short, long)]
    scheme: Option<AnnotationScheme>,

    /// Input files
    input: Vec<PathBuf>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    let mut config = CrfConfiguration::new();
    if let Some(path) = &args.config {
        let f = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "annotate: Error: Unable to open configuration file '{}': {e}",
                    path.display()
                );
                exit(2);
            }
        };
        eprintln!("Loading configuration file '{}'", path.display());
        if let Err(e) = config.read(BufReader::new(f)) {
            eprintln!("annotate: Error: {e}");
            exit(exit_code(&e));
        }
    }
    if let Some(groups) = &args.features {
        config.features_mut().enable_groups(groups);
    }
    if args.output_token {
        config.set_output_token(true);
    }
    if let Some(scheme) = args.scheme {
        config.set_annotation_scheme(scheme);
    }

    let mut extractor = FeatureExtractor::new(config.features().clone());
    extractor.have_pos_tags(config.column_of("Tag").is_some());
    if !config.patterns_filename().is_empty() {
        eprintln!("Loading {}", config.patterns_filename());
        let result = File::open(config.patterns_filename())
            .map_err(LcrfError::from)
            .and_then(|f| extractor.add_patterns_from(BufReader::new(f)));
        if let Err(e) = result {
            eprintln!("annotate: Error: {e}");
            exit(exit_code(&e));
        }
    }
    if !config.left_context_filename().is_empty() {
        eprintln!("Loading {}", config.left_context_filename());
        let result = File::open(config.left_context_filename())
            .map_err(LcrfError::from)
            .and_then(|f| extractor.add_left_contexts_from(BufReader::new(f)));
        if let Err(e) = result {
            eprintln!("annotate: Error: {e}");
            exit(exit_code(&e));
        }
    }
    if !config.right_context_filename().is_empty() {
        eprintln!("Loading {}", config.right_context_filename());
        let result = File::open(config.right_context_filename())
            .map_err(LcrfError::from)
            .and_then(|f| extractor.add_right_contexts_from(BufReader::new(f)));
        if let Err(e) = result {
            eprintln!("annotate: Error: {e}");
            exit(exit_code(&e));
        }
    }
    if !config.regex_filename().is_empty() {
        eprintln!("Loading {}", config.regex_filename());
        let result = File::open(config.regex_filename())
            .map_err(LcrfError::from)
            .and_then(|f| extractor.add_regexes_from(BufReader::new(f)));
        if let Err(e) = result {
            eprintln!("annotate: Error: {e}");
            exit(exit_code(&e));
        }
    }

    let mut out = io::BufWriter::new(io::stdout().lock());
    for path in &args.input {
        let f = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "annotate: Error: invalid training data file '{}': {e}",
                    path.display()
                );
                exit(2);
            }
        };

        eprintln!("Processing '{}'", path.display());
        let start = Instant::now();
        let result = if config.input_is_running_text() || args.running_text {
            process_text(BufReader::new(f), &config, &extractor, &mut out)
        } else {
            process_column_data(BufReader::new(f), &config, &extractor, &mut out)
        };
        match result {
            Ok(n_seq) => {
                eprintln!(" done ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
                eprintln!("[{n_seq} sequences]");
            }
            Err(e) => {
                eprintln!("annotate: Error: {e}");
                exit(exit_code(&e));
            }
        }
    }
    if let Err(e) = out.flush() {
        eprintln!("annotate: Error: {e}");
        exit(2);
    }
}

fn write_sentence<W>(
    sentence: &[TokenWithTag],
    extractor: &FeatureExtractor,
    output_token: bool,
    mut out: W,
) -> lcrf::Result<()>
where
    W: Write,
{
    let words = extractor.add_features(sentence);
    for (w, t) in words.iter().zip(sentence) {
        writeln!(out, "{}", w.to_line(&t.label, output_token))?;
    }
    writeln!(out)?;
    Ok(())
}

fn process_text<R, W>(
    mut input: R,
    config: &CrfConfiguration,
    extractor: &FeatureExtractor,
    mut out: W,
) -> lcrf::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    let mut n_seq = 0;
    let reader = SentenceReader::new(&text, config.annotation_scheme(), config.default_label());
    for sentence in reader {
        if sentence.is_empty() {
            continue;
        }
        write_sentence(&sentence, extractor, config.output_token(), &mut out)?;
        n_seq += 1;
    }
    Ok(n_seq)
}

fn process_column_data<R, W>(
    input: R,
    config: &CrfConfiguration,
    extractor: &FeatureExtractor,
    mut out: W,
) -> lcrf::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let col_count = config.columns_count();
    let Some(token_column) = config.column_of("Token") else {
        eprintln!("Missing token column");
        return Ok(0);
    };
    let Some(label_column) = config.column_of("Label") else {
        eprintln!("Missing label column");
        return Ok(0);
    };
    let tag_column = config.column_of("Tag");
    let lemma_column = config.column_of("Lemma");

    let mut n_seq = 0;
    let mut sentence: Vec<TokenWithTag> = vec![];
    for line in input.lines() {
        let mut line = line?;
        if line.ends_with('\r') {
            line.pop();
        }
        if line.is_empty() {
            if !sentence.is_empty() {
                write_sentence(&sentence, extractor, config.output_token(), &mut out)?;
                sentence.clear();
                n_seq += 1;
            }
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != col_count {
            eprintln!("Invalid line: {line}");
            continue;
        }
        let mut t = TokenWithTag::new(fields[token_column]);
        t.assign_label(fields[label_column]);
        if let Some(c) = tag_column {
            t.assign_tag(fields[c]);
        }
        if let Some(c) = lemma_column {
            t.lemma = fields[c].to_string();
        }
        sentence.push(t);
    }
    if !sentence.is_empty() {
        write_sentence(&sentence, extractor, config.output_token(), &mut out)?;
        n_seq += 1;
    }
    Ok(n_seq)
}

fn exit_code(e: &LcrfError) -> i32 {
    match e {
        LcrfError::IOError(_) => 2,
        LcrfError::InvalidArgument(_) => 1,
        _ => 3,
    }
}
