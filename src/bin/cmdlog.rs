use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use sheetcmd::wire::{decode_history, encode_history, read_history, write_history};
use sheetcmd::{CommandDescriptor, CommandFactory, CommandKind};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cmdlog")]
#[command(about = "Inspect and convert serialized command histories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of a JSON history file
    Inspect {
        file: PathBuf,
    },
    /// Check that every entry (and every nested entry) has a registered name
    Validate {
        file: PathBuf,
    },
    /// Convert a JSON history into a MessagePack file
    Pack {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Convert a MessagePack history back into JSON
    Unpack {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { file } => inspect(&file),
        Command::Validate { file } => validate(&file),
        Command::Pack { input, out } => pack(&input, &out),
        Command::Unpack { input, out } => unpack(&input, &out),
    }
}

fn load(file: &Path) -> Result<Vec<CommandDescriptor>> {
    read_history(file).with_context(|| format!("Failed to read history '{}'", file.display()))
}

fn inspect(file: &Path) -> Result<()> {
    let descriptors = load(file)?;
    println!("{} entries in '{}'", descriptors.len(), file.display());
    for (index, descriptor) in descriptors.iter().enumerate() {
        let item = descriptor
            .item_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = if descriptor.undo.is_empty() {
            "pending"
        } else {
            "executed"
        };
        let volatile = if descriptor.is_volatile { " volatile" } else { "" };
        println!(
            "{:>4}  {:<36} item={:<6} {}{}",
            index, descriptor.name, item, state, volatile
        );
    }
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    let descriptors = load(file)?;
    let factory = CommandFactory::with_default_registries();

    let mut problems = Vec::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        collect_problems(&factory, descriptor, &index.to_string(), &mut problems);
    }

    if problems.is_empty() {
        println!("{} entries OK", descriptors.len());
        return Ok(());
    }
    for problem in &problems {
        eprintln!("{}", problem);
    }
    bail!("{} problem(s) in '{}'", problems.len(), file.display())
}

fn collect_problems(
    factory: &CommandFactory,
    descriptor: &CommandDescriptor,
    path: &str,
    problems: &mut Vec<String>,
) {
    if !factory.handles(&descriptor.name) {
        problems.push(format!("[{}] unknown command '{}'", path, descriptor.name));
        return;
    }
    let nested = matches!(
        descriptor.kind(),
        Some(CommandKind::Compound) | Some(CommandKind::ServerCompound)
    );
    if !nested {
        return;
    }
    let children = descriptor
        .fields
        .get("commands")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();
    for (index, child) in children.into_iter().enumerate() {
        let child_path = format!("{}.{}", path, index);
        match serde_json::from_value::<CommandDescriptor>(child) {
            Ok(child) => collect_problems(factory, &child, &child_path, problems),
            Err(err) => problems.push(format!("[{}] not a descriptor: {}", child_path, err)),
        }
    }
}

fn pack(input: &Path, out: &Path) -> Result<()> {
    let descriptors = load(input)?;
    let bytes = encode_history(&descriptors).context("Failed to encode history")?;
    fs::write(out, &bytes).with_context(|| format!("Failed to write '{}'", out.display()))?;
    println!(
        "Packed {} entries into {} bytes at '{}'",
        descriptors.len(),
        bytes.len(),
        out.display()
    );
    Ok(())
}

fn unpack(input: &Path, out: &Path) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read '{}'", input.display()))?;
    let descriptors = decode_history(&bytes).context("Failed to decode MessagePack history")?;
    write_history(out, &descriptors)
        .with_context(|| format!("Failed to write history '{}'", out.display()))?;
    println!("Unpacked {} entries into '{}'", descriptors.len(), out.display());
    Ok(())
}
