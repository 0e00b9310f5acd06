use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use charcoal_rs::classify::classify_stats::{get_genome_summary, get_tax_map_summary};
use charcoal_rs::config::{DuplicatePolicy, NoMatchPolicy, RemoveConfig, ShredConfig, SketchParams, UnhashedPolicy};
use charcoal_rs::error::Result;
use charcoal_rs::fasta::read_sequence_records;
use charcoal_rs::lcadb::LcaDatabase;
use charcoal_rs::metagenomes::{PresenceMatrix, SampleSketch};
use charcoal_rs::remove::{split_by_hashes, write_fragments_to};
use charcoal_rs::tax_map::{hashlist_text, load_hashlist, load_hashset, save_hashset, GenomeTaxMap};
use charcoal_rs::taxdb::parse_lineages_csv;
use charcoal_rs::{classify_genome, match_metagenomes};

#[derive(Parser)]
#[command(name = "charcoal", version, about = "Find and remove contaminated contigs in genome assemblies")]
struct Cli {
    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a lineage database from reference genomes
    Index {
        /// CSV with `ident,<rank columns>`
        #[arg(long)]
        taxonomy: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(short, long, default_value_t = 31)]
        ksize: u8,
        #[arg(short, long, default_value_t = 1000)]
        scaled: u64,
        /// Genome files; the identifier is the file name up to the first '.'
        #[arg(required = true)]
        genomes: Vec<PathBuf>,
    },
    /// Sketch metagenome read files with abundances
    Sketch {
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long, default_value_t = 31)]
        ksize: u8,
        #[arg(short, long, default_value_t = 1000)]
        scaled: u64,
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// Fragment a genome and classify each fragment
    Classify {
        genome: PathBuf,
        /// Lineage database(s) built with `index`
        #[arg(long = "db", required = true)]
        dbs: Vec<PathBuf>,
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 100_000)]
        fragment_size: usize,
        #[arg(long, default_value_t = 0)]
        min_fragment_size: usize,
        #[arg(short, long, default_value_t = 31)]
        ksize: u8,
        #[arg(short, long, default_value_t = 1000)]
        scaled: u64,
        /// Drop LCAs seen fewer times than this
        #[arg(long, default_value_t = 1)]
        min_count: u32,
        #[arg(long, value_enum, default_value_t = NoMatchArg::Dirty)]
        nomatch: NoMatchArg,
        #[arg(long, value_enum, default_value_t = DuplicateArg::Overwrite)]
        duplicates: DuplicateArg,
    },
    /// Summarize a saved tax map by order and genus
    Summary {
        tax_map: PathBuf,
        /// The genome the tax map was built from; adds size and missed-hash figures
        #[arg(long)]
        genome: Option<PathBuf>,
    },
    /// Build the presence matrix of a tax map's hashes across samples
    MatchMetagenomes {
        #[arg(long)]
        tax_map: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        /// Also write the raw matrix as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Saved `.sig` sketches or read files (sketched on the fly)
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// Normalize a presence matrix and compute angular similarity
    Distance {
        matrix: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Remove all-zero presence vectors before comparing
        #[arg(long)]
        drop_empty: bool,
        /// Rescale an out-of-range matrix instead of failing
        #[arg(long)]
        force: bool,
    },
    /// Drop fragments that carry flagged hashes
    Remove {
        genome: PathBuf,
        /// Hash list (one per line) or a `.bin` hash set
        #[arg(long)]
        hashes: PathBuf,
        #[arg(long, short)]
        output: PathBuf,
        /// Where to put the removed fragments
        #[arg(long)]
        removed: Option<PathBuf>,
        #[arg(long, default_value_t = 100_000)]
        fragment_size: usize,
        #[arg(short, long, default_value_t = 31)]
        ksize: u8,
        #[arg(short, long, default_value_t = 1000)]
        scaled: u64,
        /// Keep fragments that carry no hash instead of removing them
        #[arg(long)]
        keep_unhashed: bool,
        /// Fail if any flagged hash matches no fragment
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NoMatchArg {
    Dirty,
    Clean,
    Unclassified,
}

impl From<NoMatchArg> for NoMatchPolicy {
    fn from(arg: NoMatchArg) -> Self {
        match arg {
            NoMatchArg::Dirty => NoMatchPolicy::Dirty,
            NoMatchArg::Clean => NoMatchPolicy::Clean,
            NoMatchArg::Unclassified => NoMatchPolicy::Unclassified,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DuplicateArg {
    Overwrite,
    KeepFirst,
    Reject,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Overwrite => DuplicatePolicy::Overwrite,
            DuplicateArg::KeepFirst => DuplicatePolicy::KeepFirst,
            DuplicateArg::Reject => DuplicatePolicy::Reject,
        }
    }
}

fn make_spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{}}} {{msg}}", color))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg.to_string());
    spinner
}

fn stem(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "genome".to_string())
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli.command) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Index { taxonomy, output, ksize, scaled, genomes } => {
            let params = SketchParams::new(ksize, scaled)?;
            let assignments = parse_lineages_csv(&taxonomy)?;

            let spinner = make_spinner("blue", &format!("Indexing {} genome(s)...", genomes.len()));
            let mut db = LcaDatabase::new(params);
            db.index_genomes(&genomes, &assignments)?;
            db.save(&output)?;
            spinner.finish_with_message(format!(
                "Indexed {} hashes across {} lineages into {}",
                db.n_hashes(),
                db.n_lineages(),
                output.display()
            ));
        }

        Command::Sketch { output_dir, ksize, scaled, samples } => {
            let params = SketchParams::new(ksize, scaled)?;
            fs::create_dir_all(&output_dir)?;
            let spinner = make_spinner("blue", &format!("Sketching {} sample(s)...", samples.len()));
            for path in &samples {
                let sketch = SampleSketch::from_file(path, params)?;
                let out = output_dir.join(format!("{}.sig", stem(path)));
                sketch.save(&out)?;
                log::info!("{}: {} hashes -> {}", sketch.name, sketch.abundances.len(), out.display());
            }
            spinner.finish_with_message(format!("Sketched {} sample(s).", samples.len()));
        }

        Command::Classify {
            genome,
            dbs,
            output_dir,
            fragment_size,
            min_fragment_size,
            ksize,
            scaled,
            min_count,
            nomatch,
            duplicates,
        } => {
            let config = ShredConfig {
                fragment_size,
                min_fragment_size,
                sketch: SketchParams::new(ksize, scaled)?,
                min_count,
                nomatch_policy: nomatch.into(),
                duplicate_policy: duplicates.into(),
            };

            // 1. Classify
            let spinner = make_spinner("green", &format!("Classifying fragments of {}...", genome.display()));
            let results = classify_genome(&genome, &dbs, &config)?;
            spinner.finish_with_message("Classification finished.");

            // 2. Write outputs
            let spinner = make_spinner("yellow", "Writing output files...");
            fs::create_dir_all(&output_dir)?;
            let base = stem(&genome);
            results.tax_map.save(output_dir.join(format!("{}.tax.bin", base)))?;
            results.write_fragment_report(File::create(output_dir.join(format!("{}.fragments.csv", base)))?)?;
            results.write_lineage_counts_report(File::create(output_dir.join(format!("{}.lineages.csv", base)))?)?;
            let dirty = results.dirty_hashes();
            fs::write(output_dir.join(format!("{}.dirty-hashes.txt", base)), hashlist_text(&dirty))?;
            save_hashset(&dirty, output_dir.join(format!("{}.dirty-hashes.bin", base)))?;
            spinner.finish_with_message("Output files created.");

            let s = &results.stats;
            println!(
                "{}: {} fragments ({} bp), {} clean, {} dirty, {} unclassified, {} skipped ({} bp), {} duplicate hashes",
                results.genome,
                s.n_fragments,
                s.sum_bp,
                s.n_clean,
                s.n_dirty,
                s.n_unclassified,
                s.n_skipped,
                s.sum_missed_bp,
                s.n_collisions
            );
        }

        Command::Summary { tax_map, genome } => {
            let tax_map = GenomeTaxMap::load(&tax_map)?;
            match genome {
                Some(genome) => {
                    let records = read_sequence_records(&genome)?;
                    print!("{}", get_genome_summary(&tax_map, &records)?);
                }
                None => print!("{}", get_tax_map_summary(&tax_map)),
            }
        }

        Command::MatchMetagenomes { tax_map, output, csv, samples } => {
            let tax_map = GenomeTaxMap::load(&tax_map)?;
            let spinner = make_spinner("green", &format!("Matching against {} sample(s)...", samples.len()));

            let (sketched, raw): (Vec<PathBuf>, Vec<PathBuf>) = samples
                .into_iter()
                .partition(|p| p.extension().map_or(false, |e| e == "sig"));
            let matrix = if sketched.is_empty() {
                match_metagenomes(&tax_map, &raw)?
            } else {
                let mut all = sketched
                    .iter()
                    .map(SampleSketch::load)
                    .collect::<Result<Vec<_>>>()?;
                for path in &raw {
                    all.push(SampleSketch::from_file(path, tax_map.params)?);
                }
                PresenceMatrix::build(&tax_map, &all)?
            };
            spinner.finish_with_message("Presence matrix built.");

            let summary = matrix.summary();
            println!(
                "{} samples x {} hashes; {} hashes absent everywhere, {} samples with no overlap",
                summary.n_samples, summary.n_hashes, summary.n_empty_hashes, summary.n_samples_without_overlap
            );
            matrix.save(&output)?;
            if let Some(csv) = csv {
                fs::write(csv, matrix.get_matrix_csv())?;
            }
        }

        Command::Distance { matrix, output, csv, drop_empty, force } => {
            let mut matrix = PresenceMatrix::load(&matrix)?;
            let spinner = make_spinner("green", "Computing angular similarity...");
            let empty = matrix.normalize(drop_empty);
            let mut distances = matrix.angular_similarity();
            let rescaled = distances.validate(force)?;
            spinner.finish_with_message(format!(
                "{} x {} similarity matrix ({} empty vectors{})",
                distances.len(),
                distances.len(),
                empty.len(),
                if rescaled { ", rescaled" } else { "" }
            ));
            distances.save(&output)?;
            if let Some(csv) = csv {
                fs::write(csv, distances.get_csv())?;
            }
        }

        Command::Remove {
            genome,
            hashes,
            output,
            removed,
            fragment_size,
            ksize,
            scaled,
            keep_unhashed,
            strict,
        } => {
            let config = RemoveConfig {
                fragment_size,
                sketch: SketchParams::new(ksize, scaled)?,
                unhashed: if keep_unhashed { UnhashedPolicy::Keep } else { UnhashedPolicy::Remove },
                strict,
            };
            let remove = if hashes.extension().map_or(false, |e| e == "bin") {
                load_hashset(&hashes)?
            } else {
                load_hashlist(&hashes)?
            };
            let records = read_sequence_records(&genome)?;

            let spinner = make_spinner("yellow", &format!("Removing {} flagged hashes...", remove.len()));
            let split = split_by_hashes(&records, &remove, &config)?;
            write_fragments_to(&output, &split.clean)?;
            if let Some(removed) = removed {
                write_fragments_to(&removed, &split.dirty)?;
            }
            spinner.finish_with_message(format!(
                "Kept {} fragments ({} bp); removed {} ({} bp); {} without hashes; {} flagged hashes unmatched",
                split.clean.len(),
                split.clean_bp(),
                split.dirty.len(),
                split.dirty_bp(),
                split.n_unhashed,
                split.unmatched.len()
            ));
        }
    }
    Ok(())
}
