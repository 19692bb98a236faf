use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;
use lcrf::{
    Applier, ColumnOutputter, CrfConfiguration, CrfModel, FeatureExtractor, JsonOutputter,
    LcrfError, Outputter,
};

#[derive(Clone, Copy, Debug)]
enum OutputFormat {
    Tsv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tsv" | "TSV" => Ok(Self::Tsv),
            "json" | "JSON" => Ok(Self::Json),
            _ => Err("Could not parse an output format"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "A program to apply a trained CRF model to text files.")]
struct Args {
    /// The binary model file produced by train or convert
    #[arg(short, long)]
    model: PathBuf,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The order of the model
    #[arg(short, long, default_value_t = 1)]
    order: usize,

    /// Running text input (as opposed to tab-separated column data)
    #[arg(short, long)]
    running_text: bool,

    /// Evaluation mode: compare predicted labels against the input labels
    #[arg(short, long)]
    eval: bool,

    /// Output format: {tsv, json}
    #[arg(short, long, default_value = "tsv")]
    format: OutputFormat,

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

    if args.order < 1 || args.order > 3 {
        eprintln!("apply: Error: Currently, only the orders 1, 2 or 3 are supported");
        exit(1);
    }

    let mut config = CrfConfiguration::new();
    if let Some(path) = &args.config {
        let f = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "apply: Error loading configuration file '{}': {e}",
                    path.display()
                );
                exit(2);
            }
        };
        eprintln!("Loading configuration file '{}'", path.display());
        if let Err(e) = config.read(BufReader::new(f)) {
            eprintln!("apply: Error: {e}");
            exit(exit_code(&e));
        }
    }
    if args.running_text {
        config.set_running_text(true);
    }

    eprintln!("Loading model '{}'", args.model.display());
    let model_file = match File::open(&args.model) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "apply: Error: Could not open binary model file '{}': {e}",
                args.model.display()
            );
            exit(2);
        }
    };
    let model = match CrfModel::read(BufReader::new(model_file)) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("apply: Error: {e}");
            exit(exit_code(&e));
        }
    };
    if model.order() != args.order {
        eprintln!(
            "apply: Error: Incompatible model orders (model has {}, {} requested)",
            model.order(),
            args.order
        );
        exit(3);
    }

    let mut extractor = FeatureExtractor::new(config.features().clone());
    extractor.have_pos_tags(config.column_of("Tag").is_some());
    if let Err(e) = load_resources(&mut extractor, &config) {
        eprintln!("apply: Error: {e}");
        exit(exit_code(&e));
    }

    let stdout = io::stdout().lock();
    let mut outputter: Box<dyn Outputter> = match args.format {
        OutputFormat::Tsv => Box::new(ColumnOutputter::new(stdout)),
        OutputFormat::Json => Box::new(JsonOutputter::new(stdout, config.default_label())),
    };

    let mut applier = Applier::new(&model, &config, extractor);
    for path in &args.input {
        eprintln!("Processing input file '{}'", path.display());
        let f = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("apply: Error opening file '{}': {e}", path.display());
                exit(2);
            }
        };
        let input = BufReader::new(f);

        let start = Instant::now();
        let result = outputter.begin().and_then(|()| {
            if args.eval {
                let eval = applier.evaluation_of(input, outputter.as_mut())?;
                eprintln!("  Accuracy:  {:.2}%", eval.accuracy() * 100.0);
                eprintln!("  Precision: {:.2}%", eval.precision() * 100.0);
                eprintln!("  Recall:    {:.2}%", eval.recall() * 100.0);
                Ok(())
            } else {
                applier.apply_to(input, outputter.as_mut())
            }
        });
        if let Err(e) = result.and_then(|()| outputter.end()) {
            eprintln!("apply: Error: {e}");
            exit(exit_code(&e));
        }

        let elapsed = start.elapsed().as_secs_f64();
        eprint!(
            "  Processed {} tokens in {} sequences in {:.0}ms ",
            applier.processed_tokens(),
            applier.processed_sequences(),
            elapsed * 1000.0
        );
        if elapsed > 0.0 {
            eprintln!(
                "({:.0} tokens/s)",
                applier.processed_tokens() as f64 / elapsed
            );
        } else {
            eprintln!();
        }
        applier.reset();
        outputter.reset();
    }
}

fn load_resources(extractor: &mut FeatureExtractor, config: &CrfConfiguration) -> lcrf::Result<()> {
    if !config.patterns_filename().is_empty() {
        eprintln!("Loading {}", config.patterns_filename());
        extractor.add_patterns_from(BufReader::new(File::open(config.patterns_filename())?))?;
    }
    if !config.left_context_filename().is_empty() {
        eprintln!("Loading {}", config.left_context_filename());
        extractor
            .add_left_contexts_from(BufReader::new(File::open(config.left_context_filename())?))?;
    }
    if !config.right_context_filename().is_empty() {
        eprintln!("Loading {}", config.right_context_filename());
        extractor.add_right_contexts_from(BufReader::new(File::open(
            config.right_context_filename(),
        )?))?;
    }
    if !config.regex_filename().is_empty() {
        eprintln!("Loading {}", config.regex_filename());
        extractor.add_regexes_from(BufReader::new(File::open(config.regex_filename())?))?;
    }
    Ok(())
}

fn exit_code(e: &LcrfError) -> i32 {
    match e {
        LcrfError::IOError(_) => 2,
        LcrfError::InvalidArgument(_) => 1,
        _ => 3,
    }
}
