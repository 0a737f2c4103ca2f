//! Schema Canonicalizer CLI
//!
//! Command-line interface for normalizing schema documents.

use std::cell::Cell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use schema_canon::{
    denormalize_keys, load_document, normalize_with_source, NormalizeError, NormalizeOptions,
};

/// Marker keys stripped by `denormalize` when none are given explicitly.
const STANDARD_MARKER_KEYS: &[&str] = &[
    "x-origins",
    "x-defaults",
    "x-synthetic-title",
    "x-synthetic-allOf",
    "x-inline-refs",
    "x-hash",
];

#[derive(Parser)]
#[command(name = "schema-canon")]
#[command(about = "Normalize schema documents into canonical form")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve references, merge allOf lists, and attach metadata
    Normalize {
        /// Document file to normalize
        document: PathBuf,

        /// External document used as fallback resolution root
        #[arg(long)]
        source: Option<PathBuf>,

        /// Leave $ref entries in place
        #[arg(long)]
        no_resolve_refs: bool,

        /// Leave allOf lists unmerged
        #[arg(long)]
        no_merge: bool,

        /// Lift oneOf/anyOf outward, distributing siblings into branches
        #[arg(long)]
        lift: bool,

        /// Report structural problems (non-array combinators, non-string refs)
        #[arg(long)]
        validate: bool,

        /// Allow impossible merges to collapse to {"type": "nothing"}
        #[arg(long)]
        allow_synthetic: bool,

        /// Marker key for per-field origin pointers
        #[arg(long, value_name = "KEY")]
        origins_key: Option<String>,

        /// Marker key for injected keyword defaults
        #[arg(long, value_name = "KEY")]
        defaults_key: Option<String>,

        /// Marker key for node content hashes
        #[arg(long, value_name = "KEY")]
        hash_key: Option<String>,

        /// Marker key for traversed reference history
        #[arg(long, value_name = "KEY")]
        inline_refs_key: Option<String>,

        /// Marker key for fabricated titles
        #[arg(long, value_name = "KEY")]
        title_key: Option<String>,

        /// Marker key for fabricated allOf wrappers
        #[arg(long, value_name = "KEY")]
        all_of_key: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit with code 1 when any warning was reported
        #[arg(long)]
        strict: bool,
    },

    /// Strip marker keys from a document
    Denormalize {
        /// Document file to strip
        document: PathBuf,

        /// Marker keys to strip (default: the standard x- set)
        #[arg(long, value_name = "KEY", num_args = 1..)]
        keys: Vec<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the content hash of a node
    Hash {
        /// Document file to hash
        document: PathBuf,

        /// JSON Pointer to the node (default: document root)
        #[arg(long, default_value = "")]
        pointer: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize {
            document,
            source,
            no_resolve_refs,
            no_merge,
            lift,
            validate,
            allow_synthetic,
            origins_key,
            defaults_key,
            hash_key,
            inline_refs_key,
            title_key,
            all_of_key,
            pretty,
            output,
            strict,
        } => run_normalize(NormalizeArgs {
            document,
            source,
            no_resolve_refs,
            no_merge,
            lift,
            validate,
            allow_synthetic,
            origins_key,
            defaults_key,
            hash_key,
            inline_refs_key,
            title_key,
            all_of_key,
            pretty,
            output,
            strict,
        }),

        Commands::Denormalize {
            document,
            keys,
            pretty,
            output,
        } => run_denormalize(&document, &keys, pretty, output),

        Commands::Hash { document, pointer } => run_hash(&document, &pointer),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct NormalizeArgs {
    document: PathBuf,
    source: Option<PathBuf>,
    no_resolve_refs: bool,
    no_merge: bool,
    lift: bool,
    validate: bool,
    allow_synthetic: bool,
    origins_key: Option<String>,
    defaults_key: Option<String>,
    hash_key: Option<String>,
    inline_refs_key: Option<String>,
    title_key: Option<String>,
    all_of_key: Option<String>,
    pretty: bool,
    output: Option<PathBuf>,
    strict: bool,
}

fn run_normalize(args: NormalizeArgs) -> Result<(), u8> {
    let document = load_document(&args.document).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let source = match &args.source {
        Some(path) => Some(load_document(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?),
        None => None,
    };

    let warnings = Rc::new(Cell::new(0usize));
    let ref_warnings = Rc::clone(&warnings);
    let merge_warnings = Rc::clone(&warnings);

    let mut options = NormalizeOptions::new()
        .resolve_ref(!args.no_resolve_refs)
        .merge_all_of(!args.no_merge)
        .lift_combiners(args.lift)
        .validate(args.validate)
        .allow_not_valid_synthetic_changes(args.allow_synthetic)
        .on_ref_resolve_error(move |message, path, _| {
            eprintln!("warning: {} at \"{}\"", message, path);
            ref_warnings.set(ref_warnings.get() + 1);
        })
        .on_merge_error(move |message| {
            eprintln!("warning: {}", message);
            merge_warnings.set(merge_warnings.get() + 1);
        });
    if let Some(key) = args.origins_key {
        options = options.origins_flag(key);
    }
    if let Some(key) = args.defaults_key {
        options = options.defaults_flag(key);
    }
    if let Some(key) = args.hash_key {
        options = options.hash_flag(key);
    }
    if let Some(key) = args.inline_refs_key {
        options = options.inline_refs_flag(key);
    }
    if let Some(key) = args.title_key {
        options = options.synthetic_title_flag(key);
    }
    if let Some(key) = args.all_of_key {
        options = options.synthetic_all_of_flag(key);
    }

    let result = normalize_with_source(&document, source.as_ref(), &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&result.to_value(), args.pretty, args.output)?;

    if args.strict && warnings.get() > 0 {
        eprintln!("{} warning(s) reported", warnings.get());
        return Err(1);
    }
    Ok(())
}

fn run_denormalize(
    document_path: &PathBuf,
    keys: &[String],
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<(), u8> {
    let mut document = load_document(document_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if keys.is_empty() {
        denormalize_keys(&mut document, STANDARD_MARKER_KEYS);
    } else {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        denormalize_keys(&mut document, &keys);
    }

    write_output(&document, pretty, output)
}

fn run_hash(document_path: &PathBuf, pointer: &str) -> Result<(), u8> {
    let document = load_document(document_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let options = NormalizeOptions::new().hash_flag("x-hash");
    let result = normalize_with_source(&document, None, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let id = result.id_at(pointer).ok_or_else(|| {
        let err = NormalizeError::UnknownPointer {
            pointer: pointer.to_string(),
        };
        eprintln!("Error: {}", err);
        err.exit_code() as u8
    })?;
    match result.hash_of(id) {
        Some(digest) => {
            println!("{}", digest);
            Ok(())
        }
        None => {
            // Only object nodes carry hashes.
            eprintln!("Error: no object node at pointer \"{}\"", pointer);
            Err(2)
        }
    }
}

fn write_output(
    value: &serde_json::Value,
    pretty: bool,
    output: Option<PathBuf>,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
