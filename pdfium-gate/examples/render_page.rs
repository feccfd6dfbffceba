//! Render PDF pages to PNG files, with links and glyph boxes listed on stdout.
//!
//! Run with: cargo run -p pdfium-gate --features pdfium --example render_page -- <input.pdf> <output_dir> [page_num] [long_side]

use pdfium_gate::{
    Library, NaiveTransparencyRemover, PdfiumConfig, RenderFlags, ScalingPolicy,
};
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || args.len() > 5 {
        eprintln!(
            "Usage: {} <input.pdf> <output_dir> [page_num] [long_side]",
            args[0]
        );
        eprintln!("  page_num: specific page (0-indexed) or 'all' (default: all)");
        eprintln!("  long_side: longest rendered side in pixels (default: 1920)");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let output_dir = &args[2];
    let page_spec = if args.len() >= 4 { &args[3] } else { "all" };
    let long_side = if args.len() >= 5 {
        args[4].parse::<i32>().unwrap_or_else(|_| {
            eprintln!("Error: long_side must be a whole number");
            process::exit(1);
        })
    } else {
        1920
    };

    std::fs::create_dir_all(output_dir).unwrap_or_else(|e| {
        eprintln!("Error: Failed to create output directory: {}", e);
        process::exit(1);
    });

    match render_pdf(pdf_path, output_dir, page_spec, long_side) {
        Ok(_) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn render_pdf(
    pdf_path: &str,
    output_dir: &str,
    page_spec: &str,
    long_side: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let library = Library::init_pdfium(&PdfiumConfig::from_env())?;
    let dimensions = ScalingPolicy::viewport(long_side * 9 / 16, long_side)?;
    let doc = library.load_document_from_file(pdf_path, None, dimensions)?;
    let count = doc.page_count()?;
    println!("{}: {} pages, PDF {}", pdf_path, count, doc.version()?);

    let pages: Vec<usize> = if page_spec == "all" {
        (0..count).collect()
    } else {
        vec![page_spec.parse()?]
    };

    let stem = Path::new(pdf_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let background = NaiveTransparencyRemover::default();

    for index in pages {
        let page = doc.open_page(index)?;
        let (width, height) = (page.width()?, page.height()?);
        let mut pixels = page.image_with(&background, RenderFlags::RENDER_ANNOTATIONS)?;

        // BGRA -> RGBA
        for pixel in pixels.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let output = format!("{}/{}.{}.png", output_dir, stem, index);
        write_png(&output, &pixels, width, height)?;

        let glyphs = page.characters()?.filter_map(Result::ok).count();
        println!("page {}: {}x{} px, {} glyphs -> {}", index, width, height, glyphs, output);
        for link in page.uri_annotations()? {
            let b = link.bounds;
            println!("  link [{}, {}, {}, {}] {}", b.left, b.top, b.right, b.bottom, link.uri);
        }
    }

    doc.close()?;
    library.shutdown()?;
    Ok(())
}

fn write_png(filename: &str, data: &[u8], width: u32, height: u32) -> Result<(), String> {
    let file = File::create(filename).map_err(|e| format!("Failed to create PNG file: {}", e))?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| format!("Failed to write PNG header: {}", e))?;
    writer
        .write_image_data(data)
        .map_err(|e| format!("Failed to write PNG data: {}", e))?;
    Ok(())
}
