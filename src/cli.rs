// ============================================================================
// RefPaint CLI: headless request preparation
// ============================================================================
//
// Usage examples:
//   RefPaint --prompt "a cat in a hat" --size 16:9 --request-out req.json
//   RefPaint -p "make the marked area blue" -i photo.jpg -a marks.json \
//            --composite-dir out/ --hint
//
// Images are loaded into slots in order, annotations are replayed through the
// drawing engine, and the flattened composites and wire-format request are
// written to disk. Nothing is sent over the network.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Deserialize;

use crate::components::paths::{Point, Primitive};
use crate::components::slots::{SlotManager, SlotMode};
use crate::io;
use crate::ops::request::{RequestComposer, SizeHint};
use crate::ops::wire;
use crate::settings::Settings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RefPaint headless request builder.
#[derive(Parser, Debug)]
#[command(
    name = "RefPaint",
    about = "Annotate reference images and prepare an image-generation request",
    long_about = "Load reference images into slots, replay annotations from a JSON file,\n\
                  flatten them onto their images and write the outbound request.\n\n\
                  Example:\n  \
                  RefPaint -p \"add a red scarf\" -i cat.png -a marks.json --request-out req.json"
)]
pub struct CliArgs {
    /// Prompt text.
    #[arg(short, long)]
    pub prompt: String,

    /// Reference image(s), placed into slots 1, 2, ... in order.
    #[arg(short, long, num_args = 1.., value_name = "FILE")]
    pub image: Vec<PathBuf>,

    /// JSON file with the shapes to draw on each slot.
    #[arg(short, long, value_name = "FILE.json")]
    pub annotations: Option<PathBuf>,

    /// Output aspect ratio: 1:1, 9:16, 16:9, 4:3, 3:4.
    #[arg(short, long, default_value = "1:1")]
    pub size: SizeHint,

    /// Slot mode (dual or triple). Defaults to the saved setting.
    #[arg(long, value_name = "MODE")]
    pub slots: Option<String>,

    /// Add the annotation colour hints to the prompt.
    #[arg(long)]
    pub hint: bool,

    /// Write each slot's flattened image here.
    #[arg(long, value_name = "DIR")]
    pub composite_dir: Option<PathBuf>,

    /// Write the request body (JSON) here.
    #[arg(long, value_name = "FILE")]
    pub request_out: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Annotation file
// ============================================================================

/// `{"slots": [{"slot": 1, "steps": [ {...primitive...}, {"erase": [...]} ]}]}`
#[derive(Deserialize, Debug, Default)]
pub struct AnnotationFile {
    #[serde(default)]
    pub slots: Vec<SlotAnnotations>,
}

#[derive(Deserialize, Debug)]
pub struct SlotAnnotations {
    /// 1-based slot number.
    pub slot: usize,
    #[serde(default)]
    pub steps: Vec<AnnotationStep>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AnnotationStep {
    Erase { erase: Vec<Point> },
    Draw(Primitive),
}

pub fn load_annotations(path: &Path) -> Result<AnnotationFile, String> {
    let raw = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_slice(&raw).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Replay annotation steps onto the slots, in file order.
pub fn apply_annotations(slots: &mut SlotManager, file: &AnnotationFile) -> Result<(), String> {
    for entry in &file.slots {
        let index = entry
            .slot
            .checked_sub(1)
            .ok_or_else(|| "slot numbers start at 1".to_string())?;
        let engine = slots
            .ensure_drawing_engine(index)
            .map_err(|e| e.to_string())?;
        for step in &entry.steps {
            match step {
                AnnotationStep::Draw(p) => engine.trace(p),
                AnnotationStep::Erase { erase } => engine.trace_eraser(erase),
            }
        }
    }
    Ok(())
}

/// Append one annotation hint per annotated slot, in first-mention order.
/// A slot listed more than once in the file is hinted once.
pub fn apply_hints(slots: &SlotManager, file: &AnnotationFile, prompt: &str) -> String {
    let mut hinted: Vec<usize> = Vec::new();
    let mut prompt = prompt.to_string();
    for entry in &file.slots {
        if hinted.contains(&entry.slot) {
            continue;
        }
        hinted.push(entry.slot);
        let Some(index) = entry.slot.checked_sub(1) else { continue };
        if let Some(hint) = slots.drawing_engine(index).and_then(|e| e.instruction_hint()) {
            prompt = hint.apply_to_prompt(&prompt, entry.slot);
        }
    }
    prompt
}

// ============================================================================
// Public entry point
// ============================================================================

pub fn run(args: CliArgs, settings: &Settings) -> ExitCode {
    match run_inner(&args, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("CLI run failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs, settings: &Settings) -> Result<(), String> {
    let mode = match args.slots.as_deref() {
        Some(name) => SlotMode::from_name(name)
            .ok_or_else(|| format!("unknown slot mode '{}' (use dual or triple)", name))?,
        None => settings.slot_mode,
    };

    let mut slots = SlotManager::new(mode)
        .with_max_upload_bytes(settings.max_upload_bytes)
        .with_max_image_pixels(settings.max_image_pixels)
        .with_engine_defaults(settings.engine_defaults());

    if args.image.len() > slots.capacity() {
        return Err(format!(
            "{} images given but {} mode only has {} slots",
            args.image.len(),
            mode.name(),
            slots.capacity()
        ));
    }

    for (index, path) in args.image.iter().enumerate() {
        let payload = io::load_payload(path)?;
        slots
            .set_image(index, payload.bytes, &payload.mime_type)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        if args.verbose {
            println!("[slot {}] {}", index + 1, path.display());
        }
    }

    let mut prompt = args.prompt.trim().to_string();
    if let Some(path) = &args.annotations {
        let file = load_annotations(path)?;
        apply_annotations(&mut slots, &file)?;
        if args.hint {
            prompt = apply_hints(&slots, &file, &prompt);
        }
    }

    let prepared = slots.prepared_images_for_request();

    if let Some(dir) = &args.composite_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("could not create '{}': {}", dir.display(), e))?;
        for ((index, _), payload) in slots.occupied_slots().zip(&prepared) {
            let out = dir.join(format!("slot{}.{}", index + 1, extension_for(&payload.mime_type)));
            std::fs::write(&out, &payload.bytes)
                .map_err(|e| format!("could not write '{}': {}", out.display(), e))?;
            if args.verbose {
                println!("  -> {}", out.display());
            }
        }
    }

    let request = RequestComposer::new(settings.guide_policy).build(&prompt, prepared, args.size);
    log_info!(
        "CLI request built: {} image(s), guide={}, size {}",
        request.images.len(),
        request.has_guide,
        request.size_hint
    );

    let json = wire::encode_request_pretty(&request).map_err(|e| e.to_string())?;
    match &args.request_out {
        Some(path) => std::fs::write(path, json)
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::paths::StrokeColor;

    #[test]
    fn annotation_steps_parse_shapes_and_erasers() {
        let json = r##"{"slots":[{"slot":2,"steps":[
            {"type":"rect","color":"#ff0000","width":3,"start":{"x":0,"y":0},"end":{"x":5,"y":5}},
            {"erase":[{"x":1,"y":1},{"x":2,"y":2}]}
        ]}]}"##;
        let file: AnnotationFile = serde_json::from_str(json).unwrap();
        let steps = &file.slots[0].steps;
        assert_eq!(file.slots[0].slot, 2);
        assert_eq!(
            steps[0],
            AnnotationStep::Draw(Primitive::Rect {
                color: StrokeColor::RED,
                width: 3.0,
                start: Point::new(0.0, 0.0),
                end: Point::new(5.0, 5.0),
            })
        );
        assert!(matches!(&steps[1], AnnotationStep::Erase { erase } if erase.len() == 2));
    }

    #[test]
    fn cli_flags_parse() {
        let args = CliArgs::try_parse_from([
            "RefPaint", "-p", "a fox", "-i", "a.png", "b.jpg", "--size", "9:16", "--hint",
        ])
        .unwrap();
        assert_eq!(args.image.len(), 2);
        assert_eq!(args.size, SizeHint::Portrait9x16);
        assert!(args.hint);
        assert!(CliArgs::try_parse_from(["RefPaint", "-p", "x", "--size", "2:1"]).is_err());
    }

    #[test]
    fn repeated_slot_entries_hint_once() {
        let json = r##"{"slots":[
            {"slot":1,"steps":[{"type":"line","color":"#0000ff","width":3,"start":{"x":0,"y":5},"end":{"x":9,"y":5}}]},
            {"slot":1,"steps":[{"type":"line","color":"#0000ff","width":3,"start":{"x":5,"y":0},"end":{"x":5,"y":9}}]}
        ]}"##;
        let file: AnnotationFile = serde_json::from_str(json).unwrap();
        let white = image::RgbaImage::from_pixel(10, 10, image::Rgba([255, 255, 255, 255]));
        let mut slots = SlotManager::new(SlotMode::Dual);
        slots.set_image(0, io::encode_png(&white).unwrap(), "image/png").unwrap();
        apply_annotations(&mut slots, &file).unwrap();

        assert_eq!(slots.drawing_engine(0).unwrap().paths().len(), 2);
        let prompt = apply_hints(&slots, &file, "");
        assert_eq!(
            prompt,
            "Focus on the areas circled or marked with blue lines in image 1 when generating."
        );
    }
}
