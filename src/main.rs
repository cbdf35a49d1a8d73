//! Command-line inspector for MDict containers.
//!
//! ```bash
//! RUST_LOG=info mdict-index dict.mdx info
//! mdict-index dict.mdx lookup apple
//! mdict-index dict.mdx search '^app' --limit 20
//! mdict-index dict.mdd --mdd lookup '\image.png'
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use mdict_index::{Credential, FileType, MdictReader, Mdd, Mdx, OpenOptions, Result};

#[derive(Parser, Debug)]
#[command(name = "mdict-index")]
#[command(about = "Inspect and query MDict (.mdx/.mdd) containers")]
struct Args {
    /// Path to the .mdx or .mdd file
    file: PathBuf,

    /// Treat the file as an .mdd resource container
    #[arg(long)]
    mdd: bool,

    /// Registration credential for encrypted files: <REG_CODE_HEX>,<USER_ID>
    #[arg(long, value_name = "REG_HEX,USER")]
    passcode: Option<String>,

    /// Override the text encoding declared in the header
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Return MDX records without stylesheet substitution
    #[arg(long)]
    no_styles: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print header metadata and index statistics
    Info,
    /// Print the record of a key
    Lookup { key: String },
    /// List keys matching a regular expression
    Search {
        pattern: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List keys in file order
    Keys {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = open_options(&args).and_then(|options| {
        if args.mdd {
            let reader = MdictReader::<Mdd>::open(&args.file, options)?;
            run(&reader, &args.command, |bytes: Vec<u8>| format!("{} bytes: {}", bytes.len(), preview(&bytes)))
        } else {
            let reader = MdictReader::<Mdx>::open(&args.file, options)?;
            run(&reader, &args.command, |text: String| text)
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_options(args: &Args) -> Result<OpenOptions> {
    let mut options = OpenOptions::new().substitute_styles(!args.no_styles);
    if let Some(label) = &args.encoding {
        options = options.encoding(label);
    }
    if let Some(passcode) = &args.passcode {
        let (reg_code, user_id) = passcode.split_once(',').ok_or_else(|| {
            mdict_index::MdictError::InvalidCredential(
                "expected <REG_CODE_HEX>,<USER_ID>".to_string(),
            )
        })?;
        options = options.credential(Credential::from_hex(reg_code, user_id)?);
    }
    Ok(options)
}

fn run<T: FileType>(
    reader: &MdictReader<T>,
    command: &Command,
    render: impl Fn(T::Record) -> String,
) -> Result<()> {
    match command {
        Command::Info => {
            let header = &reader.header;
            println!("Dictionary Information:");
            println!("  Title: {}", header.metadata.title);
            println!("  Version: {}", header.metadata.engine_version);
            println!("  Encoding: {}", header.encoding.name());
            println!("  Encrypted: {:?} (flags {:#04b})", header.encryption, header.encryption.bits());
            println!("  Stylesheet rules: {}", header.stylesheet.len());
            if let Some(desc) = &header.metadata.description {
                println!("  Description: {}", desc);
            }
            println!("\nStatistics:");
            println!("  Total key entries: {}", reader.num_entries());
            println!("  Key blocks: {}", reader.num_key_blocks());
            println!("  Record blocks: {}", reader.num_record_blocks());
        }
        Command::Lookup { key } => {
            for record in reader.lookup_all(key)? {
                println!("{}", render(record));
            }
        }
        Command::Search { pattern, limit } => {
            for key in reader.search(pattern, *limit)? {
                println!("{}", key);
            }
        }
        Command::Keys { limit } => {
            for key in reader.keys().take(*limit) {
                println!("{}", key);
            }
            if reader.num_entries() > *limit {
                println!("... and {} more", reader.num_entries() - limit);
            }
        }
    }
    Ok(())
}

fn preview(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(32)];
    let mut out = hex::encode(shown);
    if bytes.len() > shown.len() {
        out.push_str("...");
    }
    out
}
