use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::{LevelFilter, debug, info};
use serde_json::{Value, json};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use dbus_signature::{CompleteTypeRef, Signature, SignatureError, SignatureSettings};

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::exit;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum OutputFormat {
    Text,
    Json,
    JsonL,
}

struct SigDump {
    settings: SignatureSettings,
    signatures: Vec<String>,
    output_format: OutputFormat,
    tree: bool,
    #[cfg_attr(not(feature = "multithreading"), allow(dead_code))]
    num_threads: usize,
    output: Box<dyn Write>,
}

fn command() -> Command {
    Command::new("sig_dump")
        .about("Validate D-Bus type signatures and split them into single complete types")
        .long_about(indoc!(r#"
            Validate D-Bus type signatures and split them into single complete types.

            Signatures are read from the command line, or one per line from `--input`
            (pass `-` to read standard input). Blank lines are skipped.

            Exits with status 1 if any signature is invalid.
        "#))
        .arg(
            Arg::new("SIGNATURE")
                .action(ArgAction::Append)
                .num_args(1..)
                .help("Signatures to check."),
        )
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .value_name("PATH")
                .help("Read signatures from a file, one per line (`-` for stdin)."),
        )
        .arg(
            Arg::new("output-format")
                .long("output-format")
                .short('o')
                .value_parser(["text", "json", "jsonl"])
                .default_value("text")
                .help("Sets the output format"),
        )
        .arg(
            Arg::new("output-target")
                .long("output")
                .short('f')
                .value_name("PATH")
                .help("Writes output to the file specified instead of stdout, errors will still be printed to stderr."),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("tree")
                .long("tree")
                .action(ArgAction::SetTrue)
                .help("Descend into containers and print every nested single complete type."),
        )
        .arg(
            Arg::new("no-max-length")
                .long("no-max-length")
                .action(ArgAction::SetTrue)
                .help("Do not enforce the 255 byte signature length limit."),
        )
        .arg(
            Arg::new("num-threads")
                .long("threads")
                .short('t')
                .value_parser(clap::value_parser!(usize))
                .default_value("0")
                .help("Sets the number of worker threads, defaults to number of CPU cores."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets debug prints level for the application:
                -v   - info
                -vv  - debug
                -vvv - trace
NOTE: trace output is only available in debug builds, as it is extremely verbose."),
        )
}

impl SigDump {
    fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let output_format = match matches
            .get_one::<String>("output-format")
            .map(String::as_str)
        {
            Some("json") => OutputFormat::Json,
            Some("jsonl") => OutputFormat::JsonL,
            _ => OutputFormat::Text,
        };

        let mut signatures: Vec<String> = matches
            .get_many::<String>("SIGNATURE")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        if let Some(path) = matches.get_one::<String>("input") {
            signatures.extend(read_signatures(path)?);
        }

        if signatures.is_empty() {
            bail!("no signatures given, pass them as arguments or with `--input`");
        }

        let settings = if matches.get_flag("no-max-length") {
            SignatureSettings::new().max_length(None)
        } else {
            SignatureSettings::new()
        };

        let num_threads = matches.get_one::<usize>("num-threads").copied().unwrap_or(0);
        let num_threads = match (cfg!(feature = "multithreading"), num_threads) {
            (true, number) => number,
            (false, 0) | (false, 1) => 1,
            (false, _) => {
                eprintln!(
                    "turned on threads, but library was compiled without `multithreading` feature! using fallback sync iterator"
                );
                1
            }
        };

        let output: Box<dyn Write> = match matches.get_one::<String>("output-target") {
            Some(path) => Box::new(create_output_file(
                path,
                !matches.get_flag("no-confirm-overwrite"),
            )?),
            None => Box::new(io::stdout()),
        };

        Ok(SigDump {
            settings,
            signatures,
            output_format,
            tree: matches.get_flag("tree"),
            num_threads,
            output,
        })
    }

    /// Main entry point for `SigDump`, returns `true` if every signature was valid.
    fn run(&mut self) -> Result<bool> {
        let results = self.check_all()?;
        let signatures = std::mem::take(&mut self.signatures);
        let mut all_valid = true;

        for (text, result) in signatures.iter().zip(&results) {
            if result.is_err() {
                all_valid = false;
            }
            match self.output_format {
                OutputFormat::Text => self.write_text(text, result)?,
                OutputFormat::Json => {
                    let value = self.to_json(text, result);
                    writeln!(self.output, "{}", serde_json::to_string_pretty(&value)?)?;
                }
                OutputFormat::JsonL => {
                    let value = self.to_json(text, result);
                    writeln!(self.output, "{}", serde_json::to_string(&value)?)?;
                }
            }
        }

        self.output.flush()?;
        info!(
            "checked {} signatures, {} invalid",
            results.len(),
            results.iter().filter(|r| r.is_err()).count()
        );
        Ok(all_valid)
    }

    #[cfg(feature = "multithreading")]
    fn check_all(&self) -> Result<Vec<Result<Signature, SignatureError>>> {
        use rayon::prelude::*;

        if self.num_threads == 1 {
            return Ok(self.check_sequential());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .context("failed to build thread pool")?;
        info!("validating {} signatures in parallel", self.signatures.len());

        let signatures = &self.signatures;
        let settings = &self.settings;

        // `collect` on an indexed parallel iterator keeps the input order.
        Ok(pool.install(|| {
            signatures
                .par_iter()
                .map(|s| Signature::with_settings(s, settings))
                .collect()
        }))
    }

    #[cfg(not(feature = "multithreading"))]
    fn check_all(&self) -> Result<Vec<Result<Signature, SignatureError>>> {
        Ok(self.check_sequential())
    }

    fn check_sequential(&self) -> Vec<Result<Signature, SignatureError>> {
        self.signatures
            .iter()
            .map(|s| Signature::with_settings(s, &self.settings))
            .collect()
    }

    fn write_text(&mut self, text: &str, result: &Result<Signature, SignatureError>) -> Result<()> {
        match result {
            Ok(signature) => {
                let count = signature.single_complete_type_count();
                writeln!(self.output, "{text}: {count} single complete type(s)")?;
                for ty in signature.complete_types() {
                    if self.tree {
                        write_tree(&mut self.output, ty, 1)?;
                    } else {
                        writeln!(self.output, "  {}", ty.as_str())?;
                    }
                }
            }
            Err(e) => writeln!(self.output, "{text}: error: {e}")?,
        }
        Ok(())
    }

    fn to_json(&self, text: &str, result: &Result<Signature, SignatureError>) -> Value {
        match result {
            Ok(signature) => json!({
                "signature": text,
                "valid": true,
                "types": signature
                    .complete_types()
                    .map(|ty| type_to_json(ty, self.tree))
                    .collect::<Vec<_>>(),
            }),
            Err(e) => json!({
                "signature": text,
                "valid": false,
                "error": {
                    "kind": e.grammar().map(|g| format!("{:?}", g.kind())),
                    "offset": e.grammar().map(|g| g.offset()),
                    "message": e.to_string(),
                },
            }),
        }
    }
}

fn write_tree(out: &mut dyn Write, ty: CompleteTypeRef<'_>, depth: usize) -> io::Result<()> {
    writeln!(out, "{:indent$}{}", "", ty.as_str(), indent = depth * 2)?;
    for child in ty.children() {
        write_tree(out, child, depth + 1)?;
    }
    Ok(())
}

fn type_to_json(ty: CompleteTypeRef<'_>, tree: bool) -> Value {
    if !tree {
        return Value::String(ty.as_str().to_owned());
    }
    json!({
        "type": ty.as_str(),
        "code": ty.type_code().to_string(),
        "alignment": ty.type_code().alignment(),
        "children": ty
            .children()
            .map(|child| type_to_json(child, true))
            .collect::<Vec<_>>(),
    })
}

fn read_signatures(path: &str) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let f = File::open(path).with_context(|| format!("failed to open input `{path}`"))?;
        Box::new(BufReader::new(f))
    };

    let mut signatures = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {} of `{path}`", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        signatures.push(line.to_owned());
    }
    debug!("read {} signatures from `{path}`", signatures.len());
    Ok(signatures)
}

/// If `prompt` is passed, will display a confirmation prompt before overwriting files.
fn create_output_file(path: impl AsRef<Path>, prompt: bool) -> Result<File> {
    let p = path.as_ref();

    if p.is_dir() {
        bail!(
            "There is a directory at {}, refusing to overwrite",
            p.display()
        );
    }

    if p.exists() {
        if prompt {
            let overwrite = Confirm::new()
                .with_prompt(format!("Are you sure you want to override output file at {}", p.display()))
                .default(false)
                .interact()?;
            if !overwrite {
                bail!("Cancelled");
            }
        }
        fs::remove_file(p).with_context(|| format!("failed to remove {}", p.display()))?;
    }

    if let Some(parent) = p.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    File::create(p).with_context(|| format!("failed to create output file at {}", p.display()))
}

fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => return Ok(()),
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        3 => LevelFilter::Trace,
        _ => {
            eprintln!("using more than  -vvv does not affect verbosity level");
            LevelFilter::Trace
        }
    };

    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("failed to initialize logging")
}

fn main() -> Result<()> {
    let matches = command().get_matches();
    init_logging(matches.get_count("verbose"))?;

    let mut app = SigDump::from_cli_matches(&matches)?;
    if !app.run()? {
        exit(1);
    }
    Ok(())
}
