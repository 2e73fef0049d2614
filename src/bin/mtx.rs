//! Manutex CLI - compile AI manuscripts to LaTeX, DOCX or PDF

use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use manutex::{compile_to_latex, compile_to_word, render_pdf, ExternalMetadata, ImageAsset};

#[derive(Parser)]
#[command(name = "mtx")]
#[command(version)]
#[command(about = "Manutex - AI-manuscript to LaTeX/PDF/Word compiler", long_about = None)]
struct Cli {
    /// Input manuscript file (reads from stdin if not provided)
    input_file: Option<String>,

    /// Output file path (LaTeX goes to stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Latex)]
    format: Format,

    /// JSON file with document metadata (title, authors, affiliations,
    /// correspondence)
    #[arg(long)]
    metadata: Option<String>,

    /// Directory of image files referenced by the manuscript (PDF output
    /// only)
    #[arg(long)]
    figures: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Latex,
    Docx,
    Pdf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let manuscript = read_input(cli.input_file.as_deref())?;
    let metadata = cli
        .metadata
        .as_deref()
        .map(read_metadata)
        .transpose()?;

    match cli.format {
        Format::Latex => {
            let tex = compile_to_latex(&manuscript, metadata.as_ref())
                .map_err(|err| err.to_string())?;
            match &cli.output {
                Some(path) => fs::write(path, tex).map_err(|err| err.to_string())?,
                None => io::stdout()
                    .write_all(tex.as_bytes())
                    .map_err(|err| err.to_string())?,
            }
        }
        Format::Docx => {
            let bytes = compile_to_word(&manuscript, metadata.as_ref())
                .map_err(|err| err.to_string())?;
            let path = cli.output.clone().unwrap_or_else(|| "manuscript.docx".to_string());
            fs::write(&path, bytes).map_err(|err| err.to_string())?;
            eprintln!("Wrote {}", path);
        }
        Format::Pdf => {
            let tex = compile_to_latex(&manuscript, metadata.as_ref())
                .map_err(|err| err.to_string())?;
            let assets = cli
                .figures
                .as_deref()
                .map(load_figures)
                .transpose()?
                .unwrap_or_default();
            let bytes = render_pdf(&tex, &assets).map_err(|err| err.to_string())?;
            let path = cli.output.clone().unwrap_or_else(|| "manuscript.pdf".to_string());
            fs::write(&path, bytes).map_err(|err| err.to_string())?;
            eprintln!("Wrote {}", path);
        }
    }
    Ok(())
}

fn read_input(input_file: Option<&str>) -> Result<String, String> {
    match input_file {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path, err)),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("failed to read stdin: {}", err))?;
            Ok(buffer)
        }
    }
}

fn read_metadata(path: &str) -> Result<ExternalMetadata, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path, err))?;
    serde_json::from_str(&content).map_err(|err| format!("invalid metadata in {}: {}", path, err))
}

fn load_figures(dir: &str) -> Result<Vec<ImageAsset>, String> {
    let mut assets = Vec::new();
    let entries =
        fs::read_dir(dir).map_err(|err| format!("failed to read {}: {}", dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| err.to_string())?;
        let path: PathBuf = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let bytes = fs::read(&path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        assets.push(ImageAsset {
            name: format!("figures/{}", name),
            bytes,
        });
    }
    Ok(assets)
}
