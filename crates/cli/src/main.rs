use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{DataIndex, DataPaths, ItemTexts, Split, elliot, features, parser, split};
use ml_client::{FineTuneJob, FineTuner, TextGeneratorClient, TrainingExample};
use prompting::{
    DbbookProcessor, EncodedExample, ExperimentConfig, HfTokenizer, Materialization,
    PromptConverter, RecordEncoder, TextTokenizer, TruncateDataset, build_dataset, encode_all,
};
use ranking::{CandidatePool, RankingEvaluator, RankingSettings, ResultsWriter, rank_many};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Book recommendation as a prompting task
#[derive(Parser)]
#[command(name = "book-prompts")]
#[command(about = "Prepare DBbook prompts, fine-tune and rank with a text generation model", long_about = None)]
struct Cli {
    /// Root of the data directory (raw/, interim/, processed/, elliot/)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Dataset name under each stage directory
    #[arg(long, default_value = data_loader::DEFAULT_DATASET)]
    dataset: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split the raw training ratings into train and dev per user
    Split {
        /// Fraction of each user's ratings moved to dev
        #[arg(long, default_value = "0.1")]
        dev_size: f64,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Extract item attributes from the DBpedia property mapping
    ItemFeatures,

    /// Build user genre preferences and join every split
    Profiles,

    /// Shorten item texts to the model's maximum input length
    Truncate {
        /// Experiment params file
        #[arg(long)]
        params: PathBuf,
    },

    /// Render and encode a split to JSON lines
    Encode {
        #[arg(long)]
        params: PathBuf,

        #[arg(long, default_value = "train")]
        split: Split,

        /// Output file (one encoded example per line)
        #[arg(long)]
        output: PathBuf,
    },

    /// Fine-tune the model on the encoded train and dev splits
    Finetune {
        #[arg(long)]
        params: PathBuf,
    },

    /// Rank every test user's candidates and append them to the results file
    Rank {
        #[arg(long)]
        params: PathBuf,

        /// Users ranked at the same time
        #[arg(long, default_value = "1")]
        concurrency: usize,

        /// Directory of the results file
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
    },

    /// Write positive-only train/test files for the external evaluator
    ElliotExport {
        /// Keep test items with complete attributes instead of texts
        #[arg(long)]
        structured: bool,
    },

    /// Drop predictions of users absent from the exported test file
    ElliotPreds {
        /// Filter against the structured variant's test file
        #[arg(long)]
        structured: bool,

        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let paths = DataPaths::new(&cli.data_dir, &cli.dataset);
    let start = Instant::now();

    match cli.command {
        Commands::Split { dev_size, seed } => handle_split(&paths, dev_size, seed)?,
        Commands::ItemFeatures => handle_item_features(&paths)?,
        Commands::Profiles => handle_profiles(&paths)?,
        Commands::Truncate { params } => handle_truncate(&paths, &params)?,
        Commands::Encode {
            params,
            split,
            output,
        } => handle_encode(paths, &params, split, &output)?,
        Commands::Finetune { params } => handle_finetune(paths, &params).await?,
        Commands::Rank {
            params,
            concurrency,
            results_dir,
        } => handle_rank(paths, &params, concurrency, &results_dir).await?,
        Commands::ElliotExport { structured } => handle_elliot_export(&paths, structured)?,
        Commands::ElliotPreds {
            structured,
            input,
            output,
        } => handle_elliot_preds(&paths, structured, &input, &output)?,
    }

    println!("{} Done in {:.2?}", "✓".green(), start.elapsed());
    Ok(())
}

fn load_config(params: &Path) -> Result<ExperimentConfig> {
    ExperimentConfig::from_file(params)
        .with_context(|| format!("Failed to load params from {}", params.display()))
}

fn load_tokenizer(config: &ExperimentConfig) -> Result<Arc<dyn TextTokenizer>> {
    let path = config.tokenizer_path();
    let tokenizer = HfTokenizer::from_file(&path, config.max_seq_length)
        .with_context(|| format!("Failed to load tokenizer from {}", path.display()))?;
    Ok(Arc::new(tokenizer))
}

fn converter(config: &ExperimentConfig, tokenizer: Arc<dyn TextTokenizer>) -> Result<PromptConverter> {
    let encoder = RecordEncoder::new(tokenizer, Some(config.mapping.clone()), config.max_seq_length);
    Ok(PromptConverter::new(config.template()?, encoder))
}

/// Handle the 'split' command
fn handle_split(paths: &DataPaths, dev_size: f64, seed: u64) -> Result<()> {
    let ratings = parser::parse_ratings(&paths.raw_split(Split::Train))
        .context("Failed to load raw training ratings")?;
    let (train, dev) = split::train_dev_split(&ratings, dev_size, seed)?;

    parser::write_ratings(&paths.interim_split(Split::Train), &train)?;
    parser::write_ratings(&paths.interim_split(Split::Dev), &dev)?;

    let test = parser::parse_ratings(&paths.raw_split(Split::Test))
        .context("Failed to load raw test ratings")?;
    parser::write_ratings(&paths.interim_split(Split::Test), &test)?;

    println!(
        "{}train {} / dev {} / test {}",
        "• ".cyan(),
        train.len(),
        dev.len(),
        test.len()
    );
    Ok(())
}

/// Handle the 'item-features' command
fn handle_item_features(paths: &DataPaths) -> Result<()> {
    let items = features::extract_item_attributes(
        &paths.raw_mapping_entities(),
        &paths.raw_item_properties(),
    )
    .context("Failed to extract item attributes")?;
    parser::write_item_attributes(&paths.item_attributes(), &items)?;

    let complete = items.iter().filter(|item| item.is_complete()).count();
    println!(
        "{}{} items ({} with every attribute)",
        "• ".cyan(),
        items.len(),
        complete
    );
    Ok(())
}

/// Handle the 'profiles' command
fn handle_profiles(paths: &DataPaths) -> Result<()> {
    let index = DataIndex::load_from_files(
        &paths.interim_split(Split::Train),
        &paths.item_attributes(),
    )
    .context("Failed to build the data index")?;

    for split in [Split::Train, Split::Dev, Split::Test] {
        let ratings = parser::parse_ratings(&paths.interim_split(split))
            .with_context(|| format!("Failed to load interim {} ratings", split))?;
        let rows = index.join_split(&ratings);
        parser::write_processed_rows(&paths.processed_split(split), &rows)?;
        println!("{}{}: {} rows", "• ".cyan(), split, rows.len());
    }
    Ok(())
}

/// Handle the 'truncate' command
fn handle_truncate(paths: &DataPaths, params: &Path) -> Result<()> {
    let config = load_config(params)?;
    let tokenizer = load_tokenizer(&config)?;
    let encoder = RecordEncoder::new(tokenizer, None, config.max_seq_length);

    let texts = ItemTexts::new(paths.raw_texts())
        .read_all()
        .context("Failed to read raw item texts")?;
    let truncated = TruncateDataset::new(texts, &encoder)?;

    let out = ItemTexts::new(paths.processed_texts());
    for (item_id, text) in truncated.texts() {
        out.write(*item_id, text)?;
    }
    println!(
        "{}{} texts truncated to {} tokens",
        "• ".cyan(),
        truncated.len(),
        config.max_seq_length
    );
    Ok(())
}

fn encode_split(
    processor: &DbbookProcessor,
    converter: &PromptConverter,
    config: &ExperimentConfig,
    split: Split,
) -> Result<Vec<EncodedExample>> {
    let records = processor
        .examples(split)
        .with_context(|| format!("Failed to load {} examples", split))?;
    let materialization = Materialization::for_split(split, config.always_preprocess);
    let dataset = build_dataset(records, converter.clone(), materialization)?;
    Ok(encode_all(dataset.as_ref())?)
}

/// Handle the 'encode' command
fn handle_encode(paths: DataPaths, params: &Path, split: Split, output: &Path) -> Result<()> {
    let config = load_config(params)?;
    let converter = converter(&config, load_tokenizer(&config)?)?;
    let processor = DbbookProcessor::new(paths, config.task()?)?;
    let examples = encode_split(&processor, &converter, &config, split)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );
    for example in &examples {
        serde_json::to_writer(&mut writer, example)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    println!(
        "{}{} {} examples written to {}",
        "• ".cyan(),
        examples.len(),
        split,
        output.display()
    );
    Ok(())
}

fn to_training_example(example: EncodedExample) -> Result<TrainingExample> {
    let labels = example
        .labels
        .ok_or_else(|| anyhow!("Encoded example has no labels"))?;
    Ok(TrainingExample {
        input_ids: example.input_ids,
        attention_mask: example.attention_mask,
        labels,
    })
}

/// Handle the 'finetune' command
async fn handle_finetune(paths: DataPaths, params: &Path) -> Result<()> {
    let config = load_config(params)?;
    let converter = converter(&config, load_tokenizer(&config)?)?;
    let processor = DbbookProcessor::new(paths, config.task()?)?;

    let train = encode_split(&processor, &converter, &config, Split::Train)?;
    let eval = encode_split(&processor, &converter, &config, Split::Dev)?;

    let job = FineTuneJob {
        model_name_or_path: config.model_name_or_path.clone(),
        output_dir: config.output_dir.display().to_string(),
        train: train.into_iter().map(to_training_example).collect::<Result<_>>()?,
        eval: eval.into_iter().map(to_training_example).collect::<Result<_>>()?,
        training_args_json: serde_json::to_string(&config.training_args)?,
        seed: config.seed,
    };

    let client = TextGeneratorClient::connect(&config.service_addr, &config.model_name_or_path).await?;
    let report = client.fine_tune(job).await.context("Fine-tuning failed")?;

    println!("{}", "Checkpoints:".bold().blue());
    for checkpoint in &report.checkpoints {
        println!("  - {}", checkpoint);
    }
    if !report.metrics_json.is_empty() {
        println!("{}Metrics: {}", "• ".cyan(), report.metrics_json);
    }
    Ok(())
}

/// Handle the 'rank' command
async fn handle_rank(
    paths: DataPaths,
    params: &Path,
    concurrency: usize,
    results_dir: &Path,
) -> Result<()> {
    let config = load_config(params)?;
    let tokenizer = load_tokenizer(&config)?;
    let settings = RankingSettings::from_config(&config, tokenizer.as_ref())?;
    let converter = converter(&config, tokenizer)?;

    let raw_test = parser::parse_ratings(&paths.raw_split(Split::Test))
        .context("Failed to load raw test ratings")?;
    let users = ranking::test_users(&raw_test);

    let processor = DbbookProcessor::new(paths, config.task()?)?;
    let pool = Arc::new(CandidatePool::load(&processor).context("Failed to load candidates")?);

    let model = match config.checkpoint {
        Some(_) => config.checkpoint_dir().display().to_string(),
        None => config.model_name_or_path.clone(),
    };
    let client = TextGeneratorClient::connect(&config.service_addr, model).await?;
    let evaluator = RankingEvaluator::new(Arc::new(client), converter, pool, settings)?;

    let path = ranking::results_path(results_dir, &config.run_name());
    let mut writer = ResultsWriter::append(&path).await?;
    let summary = rank_many(&evaluator, &users, &mut writer, concurrency).await?;

    println!("{}", format!("Rankings appended to {}", path.display()).bold().blue());
    println!("{}Users: {}", "• ".cyan(), summary.users);
    println!("{}Ranked items: {}", "• ".cyan(), summary.ranked_items);
    println!(
        "{}Users without candidates: {}",
        "• ".cyan(),
        summary.users_without_candidates
    );
    Ok(())
}

/// Handle the 'elliot-export' command
fn handle_elliot_export(paths: &DataPaths, structured: bool) -> Result<()> {
    let (train, test) = elliot::export(paths, structured)
        .context("Failed to export evaluator inputs")?;

    println!(
        "{}{} train / {} test interactions in {}",
        "• ".cyan(),
        train,
        test,
        paths.elliot_dir(structured).display()
    );
    Ok(())
}

/// Handle the 'elliot-preds' command
fn handle_elliot_preds(paths: &DataPaths, structured: bool, input: &Path, output: &Path) -> Result<()> {
    let (kept, total) = elliot::filter_prediction_file(paths, structured, input, output)
        .with_context(|| format!("Failed to filter predictions from {}", input.display()))?;

    println!("{}{} of {} predictions kept", "• ".cyan(), kept, total);
    Ok(())
}
