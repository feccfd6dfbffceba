//! Split, merge or unlock PDF files.
//!
//! Run with: cargo run -p pdfium-gate --features pdfium --example split_document -- <command> ...
//!
//!   split  <input.pdf> <range> <output.pdf>      e.g. range "1-7,12,14-18"
//!   merge  <output.pdf> <first.pdf> <other.pdf>...
//!   unlock <input.pdf> <password> <output.pdf>

use pdfium_gate::{Library, PageRange, PdfiumConfig};
use std::env;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 5 {
        eprintln!("Usage: {} split <input.pdf> <range> <output.pdf>", args[0]);
        eprintln!("       {} merge <output.pdf> <first.pdf> <other.pdf>...", args[0]);
        eprintln!("       {} unlock <input.pdf> <password> <output.pdf>", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(&args[1], &args[2..]) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let library = Library::init_pdfium(&PdfiumConfig::from_env())?;
    let editor = library.editor();

    let (output, bytes) = match command {
        "split" => {
            let range = PageRange::parse(&args[1])?;
            (&args[2], editor.split_file(&args[0], &range)?)
        }
        "merge" => (&args[0], editor.merge_files(args[1].clone(), &args[2..])?),
        "unlock" => (&args[2], editor.unlock_file(&args[0], Some(args[1].as_str()))?),
        other => return Err(format!("unknown command `{}`", other).into()),
    };

    std::fs::write(output, &bytes)?;
    println!("wrote {} bytes to {}", bytes.len(), output);
    library.shutdown()?;
    Ok(())
}
