use stereo_index::chiral::chiral_centers;
use stereo_index::config::IndexConfig;
use stereo_index::error::Error;
use stereo_index::pipeline::build_index_with_config;
use stereo_index::store::{extract, read_at, MoleculeStore};

use clap::{Args, Parser, Subcommand};
use glob::glob;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Builds and inspects stereocenter offset indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Index every record with enough stereocenters
    Build(BuildArgs),
    /// Print random indexed molecules
    Sample(SampleArgs),
    /// Print the stereocenters of one record
    Centers(CentersArgs),
    /// Copy indexed records from several files into one
    Extract(ExtractArgs),
    /// Write a default config for a source file
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {

    //source file, or a glob matching several
    #[arg(short, long)]
    input: String,

    #[arg(long)]
    index: Option<PathBuf>,

    #[arg(long)]
    checkpoint: Option<PathBuf>,

    //yaml config, overridden by any flag below
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    min_chiral: Option<usize>,

    #[arg(long)]
    progress: bool,
}

#[derive(Args, Debug)]
struct SampleArgs {

    #[arg(short, long)]
    input: PathBuf,

    #[arg(long)]
    index: Option<PathBuf>,

    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,
}

#[derive(Args, Debug)]
struct CentersArgs {

    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long, default_value_t = 0)]
    offset: u64,
}

#[derive(Args, Debug)]
struct ExtractArgs {

    //SOURCE:INDEX, repeatable
    #[arg(short, long = "pair", value_parser = parse_pair, required = true)]
    pairs: Vec<(PathBuf, PathBuf)>,

    #[arg(short, long)]
    output: PathBuf,

    #[arg(long)]
    output_index: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {

    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    write: PathBuf,
}

fn parse_pair(s: &str) -> Result<(PathBuf, PathBuf), String> {

    match s.rsplit_once(':') {
        Some((source, index)) if !source.is_empty() && !index.is_empty() => Ok((PathBuf::from(source), PathBuf::from(index))),
        _ => Err(format!("expected SOURCE:INDEX, got {:?}", s)),
    }
}

fn default_index(source: &Path) -> PathBuf {
    IndexConfig::for_source(source).index
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.task {
        Task::Build(args) => build(args).await,
        Task::Sample(args) => sample(args),
        Task::Centers(args) => centers(args),
        Task::Extract(args) => extract_records(args),
        Task::Config(args) => write_config(args),
    };

    if let Err(e) = &result {
        error!("{}", e);
    }

    result?;

    Ok(())
}

fn expand_inputs(pattern: &str) -> Result<Vec<PathBuf>, Error> {

    let literal = PathBuf::from(pattern);
    if literal.exists() {
        return Ok(vec![literal]);
    }

    let mut sources: Vec<PathBuf> = Vec::new();
    let paths = glob(pattern).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    for path in paths {
        match path {
            Ok(path) => sources.push(path),
            Err(e) => warn!("skipping unreadable glob match: {}", e),
        }
    }

    match sources.is_empty() {
        true => Err(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no files match {:?}", pattern)).into()),
        false => Ok(sources),
    }
}

fn build_config(args: &BuildArgs, source: &Path, several: bool) -> Result<IndexConfig, Error> {

    let mut config = match &args.config {
        Some(path) => {
            let mut config = IndexConfig::from_file(path)?;
            //one config file can drive a whole glob, so paths follow each source
            if several {
                let derived = IndexConfig::for_source(source);
                config.index = derived.index;
                config.checkpoint = derived.checkpoint;
            }
            config.source = source.to_path_buf();
            config
        },
        None => IndexConfig::for_source(source),
    };

    //explicit paths only make sense for a single source
    if !several {
        if let Some(index) = &args.index {
            config.index = index.clone();
        }
        if let Some(checkpoint) = &args.checkpoint {
            config.checkpoint = checkpoint.clone();
        }
    }

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(min_chiral) = args.min_chiral {
        config.min_chiral_centers = min_chiral;
    }
    if args.progress {
        config.progress = true;
    }

    Ok(config.clamped())
}

async fn build(args: BuildArgs) -> Result<(), Error> {

    let sources = expand_inputs(&args.input)?;
    let several = sources.len() > 1;

    if several && (args.index.is_some() || args.checkpoint.is_some()) {
        warn!("--index and --checkpoint are ignored when the input matches several files");
    }

    for source in sources.iter() {

        let config = build_config(&args, source, several)?;
        info!("building {:?} -> {:?}", config.source, config.index);

        let summary = build_index_with_config(&config).await?;

        println!("index written: {}", summary.index.display());
        println!(
            "  scanned {}, dispatched {}, resumed past {}, parse failures {}, timeouts {}, written {}, duplicates {}",
            summary.scanned,
            summary.dispatched,
            summary.skipped_by_resume,
            summary.parse_failures,
            summary.timeouts,
            summary.written,
            summary.duplicates,
        );
    }

    Ok(())
}

fn sample(args: SampleArgs) -> Result<(), Error> {

    let index = args.index.unwrap_or_else(|| default_index(&args.input));
    let store = MoleculeStore::open(&args.input, &index)?;

    info!("{} offsets in {:?}", store.index().len(), index);

    for _ in 0..args.count {
        let (offset, mut mol) = store.random()?;
        let centers = chiral_centers(&mut mol);
        println!("{}\t{}\t{:?}", offset, mol.name, centers);
    }

    Ok(())
}

fn centers(args: CentersArgs) -> Result<(), Error> {

    let mut mol = read_at(&args.input, args.offset)?;
    let centers = chiral_centers(&mut mol);

    println!("{}\t{} atoms\t{:?}", mol.name, mol.atom_count(), centers);

    Ok(())
}

fn extract_records(args: ExtractArgs) -> Result<(), Error> {

    let output_index = args.output_index.unwrap_or_else(|| default_index(&args.output));
    let copied = extract(&args.pairs, &args.output, &output_index)?;

    println!("{} records written to {} (index {})", copied, args.output.display(), output_index.display());

    Ok(())
}

fn write_config(args: ConfigArgs) -> Result<(), Error> {

    let config = IndexConfig::for_source(&args.input);
    config.to_file(&args.write)?;

    println!("config written: {}", args.write.display());

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;

    fn build_args(input: &str) -> BuildArgs {

        BuildArgs {
            input: input.to_string(),
            index: Some(PathBuf::from("custom.index")),
            checkpoint: None,
            config: None,
            workers: Some(0),
            timeout_ms: Some(250),
            min_chiral: None,
            progress: false,
        }
    }

    #[test]
    fn pairs_split_on_the_last_colon() {

        assert_eq!(parse_pair("a.sdf:a.index").unwrap(), (PathBuf::from("a.sdf"), PathBuf::from("a.index")));
        assert_eq!(parse_pair("C:\\data\\a.sdf:a.index").unwrap().1, PathBuf::from("a.index"));
        assert!(parse_pair("a.sdf").is_err());
        assert!(parse_pair("a.sdf:").is_err());
    }

    #[test]
    fn flags_override_defaults() {

        let config = build_config(&build_args("x.sdf"), Path::new("x.sdf"), false).unwrap();

        assert_eq!(config.index, PathBuf::from("custom.index"));
        assert_eq!(config.checkpoint, PathBuf::from("x.progress"));
        assert_eq!(config.workers, 1);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.min_chiral_centers, 3);
    }

    #[test]
    fn globbed_sources_derive_their_own_paths() {

        let config = build_config(&build_args("*.sdf"), Path::new("b.sdf"), true).unwrap();

        assert_eq!(config.index, PathBuf::from("b.index"));
        assert_eq!(config.checkpoint, PathBuf::from("b.progress"));
    }

    #[test]
    fn config_file_is_read_then_overridden() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut stored = IndexConfig::for_source(Path::new("stored.sdf"));
        stored.min_chiral_centers = 5;
        stored.to_file(&path).unwrap();

        let mut args = build_args("x.sdf");
        args.config = Some(path);
        args.index = None;

        let config = build_config(&args, Path::new("x.sdf"), false).unwrap();

        assert_eq!(config.source, PathBuf::from("x.sdf"));
        assert_eq!(config.index, PathBuf::from("stored.index"));
        assert_eq!(config.min_chiral_centers, 5);
        assert_eq!(config.timeout_ms, 250);
    }

    #[test]
    fn cli_parses_subcommands() {

        let cli = Cli::try_parse_from(["builder", "extract", "--pair", "a.sdf:a.index", "--pair", "b.sdf:b.index", "--output", "m.sdf"]).unwrap();

        match cli.task {
            Task::Extract(args) => {
                assert_eq!(args.pairs.len(), 2);
                assert_eq!(args.output_index, None);
            },
            _ => panic!("wrong subcommand"),
        }
    }
}
