use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use lcrf::{CrfModel, LcrfError, PerceptronTrainer, TrainerOptions, TrainingCorpus};

#[derive(Parser, Debug)]
#[command(about = "A program to train linear-chain CRF models with the averaged perceptron.")]
struct Args {
    /// The file to write the trained binary model to
    #[arg(short, long)]
    model: PathBuf,

    /// The order of the model
    #[arg(short, long, default_value_t = 1)]
    order: usize,

    /// The number of training iterations
    #[arg(short = 'n', long, default_value_t = 100)]
    iterations: u32,

    /// Stop early once the per-iteration loss drops to this value
    #[arg(long)]
    threshold: Option<f64>,

    /// Seed for the inter-iteration corpus shuffle
    #[arg(long)]
    seed: Option<u64>,

    /// Drop attributes occurring fewer times than this in the corpus
    #[arg(long)]
    prune: Option<u32>,

    /// Create lower-order back-off transitions for higher-order models
    #[arg(long)]
    backoff: bool,

    /// A tab-separated training corpus: token, label, attributes; sequences
    /// separated by empty lines
    corpus: PathBuf,
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
        eprintln!("train: Error: Currently, only the orders 1, 2 or 3 are supported");
        exit(1);
    }

    let corpus_file = match File::open(&args.corpus) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "train: Error: Unable to open training corpus file '{}': {e}",
                args.corpus.display()
            );
            exit(2);
        }
    };

    eprintln!("Reading training data...");
    let mut corpus = match TrainingCorpus::from_reader(BufReader::new(corpus_file)) {
        Ok(corpus) => corpus,
        Err(e) => {
            eprintln!("train: Error: {e}");
            exit(exit_code(&e));
        }
    };
    eprintln!(
        "[{} labels, {} attributes, {} tokens, {} sequences]",
        corpus.labels_count(),
        corpus.attributes_count(),
        corpus.token_count(),
        corpus.len()
    );
    if corpus.labels_count() > 1000 {
        eprintln!(
            "train: Warning: The number of labels is unusually high. \
             You may experience memory problems"
        );
    }

    if let Some(threshold) = args.prune {
        let pruned = corpus.prune(threshold);
        eprintln!("[pruned {pruned} attribute occurrences]");
    }

    let options = TrainerOptions {
        max_iterations: args.iterations,
        loss_threshold: args.threshold,
        shuffle_seed: args.seed,
        backoff_transitions: args.backoff,
    };

    eprintln!("Building initial model (order={})...", args.order);
    let start = Instant::now();
    let mut trainer = match PerceptronTrainer::new(&corpus, args.order, options) {
        Ok(trainer) => trainer,
        Err(e) => {
            eprintln!("train: Error: {e}");
            exit(exit_code(&e));
        }
    };
    print_model_info(trainer.model());

    eprintln!(
        "Estimating model parameters ({} iterations)",
        args.iterations
    );
    let losses = match trainer.train(&mut corpus) {
        Ok(losses) => losses,
        Err(e) => {
            eprintln!("train: Error: {e}");
            exit(exit_code(&e));
        }
    };
    for (i, loss) in losses.iter().enumerate() {
        eprintln!("Iteration {}: loss: {loss}", i + 1);
    }
    eprintln!("Training time: {:.2}s", start.elapsed().as_secs_f64());

    let model = trainer.into_model();
    eprintln!("Writing binary model '{}'", args.model.display());
    let out = match File::create(&args.model) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "train: Error: Unable to create '{}': {e}",
                args.model.display()
            );
            exit(2);
        }
    };
    if let Err(e) = model.write(BufWriter::new(out)) {
        eprintln!("train: Error: {e}");
        exit(exit_code(&e));
    }
    print_model_info(&model);
}

fn print_model_info(model: &CrfModel) {
    let meta = model.meta_data();
    eprintln!("============================================");
    eprintln!("# labels:      {}", meta.num_labels);
    if model.order() > 1 {
        eprintln!("# states:      {}", meta.num_states);
    }
    eprintln!("# transitions: {}", meta.num_transitions);
    eprintln!("# features:    {}", meta.num_features);
    eprintln!("# attributes:  {}", meta.num_attributes);
    eprintln!("# parameters:  {}", meta.num_parameters);
    eprintln!("  # non-null parameters: {}", meta.num_non_null_parameters);
    eprintln!("============================================");
}

fn exit_code(e: &LcrfError) -> i32 {
    match e {
        LcrfError::IOError(_) => 2,
        LcrfError::InvalidArgument(_) => 1,
        _ => 3,
    }
}
