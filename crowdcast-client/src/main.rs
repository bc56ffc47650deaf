//! crowdcast - command-line entry point
//!
//! Fetches questions anonymously and prints community samples, submission
//! request bodies, listings and CDFs as JSON on stdout. Nothing is posted.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crowdcast_client::cdf_client::measurement_request;
use crowdcast_client::pagination::fetch_question_pages;
use crowdcast_client::repository::get_question;
use crowdcast_client::{CdfClient, PlayerStatus, QuestionQuery, QuestionStatus, QuestionsClient};
use crowdcast_common::config::{ConfigResolver, LoggingConfig};
use crowdcast_common::question::question_type;
use crowdcast_common::{
    Cdf, DistributionClipper, MomentFitter, Question, SampleSet, SubmissionBuilder,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for crowdcast
#[derive(Parser, Debug)]
#[command(name = "crowdcast")]
#[command(about = "Translate forecasts between samples, platform submissions and community predictions")]
#[command(version)]
struct Args {
    /// Config file (overrides CROWDCAST_CONFIG and the per-user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed (overrides sampling.seed)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample the community prediction of a continuous question on its true scale
    Community {
        /// Question id
        question: u64,

        /// Number of samples (default: sampling.community_samples)
        #[arg(short = 'n', long)]
        samples: Option<usize>,
    },

    /// Print the prediction request body for a question
    Submission {
        /// Question id
        question: u64,

        /// JSON array of true-scale samples (numbers or YYYY-MM-DD dates)
        #[arg(long, required_unless_present = "probability", conflicts_with = "probability")]
        samples_file: Option<PathBuf>,

        /// Probability for a binary question
        #[arg(long)]
        probability: Option<f64>,
    },

    /// List questions, one JSON summary per line
    List {
        #[arg(long, value_enum, default_value_t = QuestionStatus::All)]
        status: QuestionStatus,

        #[arg(long, value_enum, default_value_t = PlayerStatus::Any)]
        player: PlayerStatus,

        /// Category slug
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of pages (20 questions each)
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Keep discussion questions
        #[arg(long)]
        include_discussion: bool,
    },

    /// Sample the aggregate CDF of a measurable
    CdfSample {
        /// Measurable id
        measurable: String,

        #[arg(short = 'n', long)]
        samples: Option<usize>,
    },

    /// Build a CDF from a JSON array of numeric samples
    CdfFromSamples {
        samples_file: PathBuf,

        /// Number of CDF points (default: sampling.cdf_length)
        #[arg(long)]
        length: Option<usize>,

        /// Also print the measurement body for this measurable
        #[arg(long)]
        measurable: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config resolution logs before the configured subscriber exists
    let bootstrap = tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .with_writer(std::io::stderr)
        .finish();
    let (config, source) = tracing::subscriber::with_default(bootstrap, || {
        ConfigResolver::new(args.config.clone()).resolve()
    })
    .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;
    info!("Configuration source: {:?}", source);

    let seed = args.seed.or(config.sampling.seed);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let timeout = Duration::from_secs(config.api.timeout_secs);

    match args.command {
        Command::Community { question, samples } => {
            let client = QuestionsClient::new(&config.api.questions_url, timeout)?;
            let question = get_question(&client, question, None).await?;
            let continuous = match question.as_continuous() {
                Some(q) => q,
                None => bail!("question {} is not continuous", question.id()),
            };
            let n = samples.unwrap_or(config.sampling.community_samples);
            let draws = continuous.sample_community_n(&mut rng, n)?;
            print_json(&json!({
                "question": question.id(),
                "scale": continuous.scale().kind_name(),
                "axis": continuous.scale().axis(),
                "samples": draws,
            }))?;
        }

        Command::Submission {
            question,
            samples_file,
            probability,
        } => {
            let client = QuestionsClient::new(&config.api.questions_url, timeout)?;
            let question = get_question(&client, question, None).await?;
            let body = match (&question, samples_file, probability) {
                (Question::Binary(q), _, Some(p)) => serde_json::to_value(q.prediction_request(p)?)?,
                (Question::Continuous(q), Some(path), _) => {
                    let samples = SampleSet::from_json(&read_json(&path)?)?;
                    let builder = SubmissionBuilder::new(MomentFitter)
                        .with_clipper(DistributionClipper::new(config.clipping))
                        .with_samples_for_fit(config.sampling.samples_for_fit);
                    let submission = q.submission_from_samples(&builder, &samples)?;
                    serde_json::to_value(submission.to_request()?)?
                }
                (Question::Binary(_), _, None) => bail!("binary questions need --probability"),
                (Question::Continuous(_), None, _) => {
                    bail!("continuous questions need --samples-file")
                }
            };
            print_json(&json!({
                "url": client.predict_url(question.id()),
                "body": body,
            }))?;
        }

        Command::List {
            status,
            player,
            category,
            pages,
            include_discussion,
        } => {
            let client = QuestionsClient::new(&config.api.questions_url, timeout)?;
            let query = QuestionQuery {
                status,
                player,
                category,
                user_id: config.api.user_id,
            };
            let documents = fetch_question_pages(&client, &query, pages, include_discussion).await?;
            for document in documents {
                let line = match Question::from_json(document.clone(), None) {
                    Ok(question) => serde_json::to_value(question.summary())?,
                    Err(_) => json!({
                        "id": document.get("id"),
                        "title": document.get("title"),
                        "type": question_type(&document),
                    }),
                };
                println!("{}", line);
            }
        }

        Command::CdfSample {
            measurable,
            samples,
        } => {
            let client = CdfClient::new(&config.api.cdf_endpoint, timeout)?;
            let question = client.get_question(&measurable).await?;
            let n = samples.unwrap_or(config.sampling.community_samples);
            let draws = question.cdf().sample_n(&mut rng, n);
            print_json(&json!({
                "url": question.url(),
                "samples": draws,
            }))?;
        }

        Command::CdfFromSamples {
            samples_file,
            length,
            measurable,
        } => {
            let samples = match SampleSet::from_json(&read_json(&samples_file)?)? {
                SampleSet::Values(values) => values,
                SampleSet::Dates(_) => bail!("CDFs are built from numeric samples"),
            };
            let cdf = Cdf::from_samples(&samples, length.unwrap_or(config.sampling.cdf_length))?;
            match measurable {
                Some(id) => print_json(&serde_json::to_value(measurement_request(&id, &cdf))?)?,
                None => print_json(&serde_json::to_value(&cdf)?)?,
            }
        }
    }

    Ok(())
}

/// Install the subscriber: EnvFilter from RUST_LOG or `logging.level`,
/// writing to `logging.file` when set and stderr otherwise
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = if file_layer.is_none() {
        Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not JSON", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
