//! Line-oriented interactive session
//!
//! Each input line is one interaction, handled to completion before the next
//! line is read.

use super::main_impl::spinner;
use crate::{
    canvas::StrokeEvent,
    services::{ImageIOService, BACKGROUND_REMOVED_FILE_NAME, ERASED_FILE_NAME},
    session::{EditorSession, Notice, SessionEvent},
    types::EditResult,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Background removal tab:
  bg-upload <file>        load a PNG or JPEG photo
  bg-run                  remove the background
  bg-save [file]          save the cut-out (default no_bg.png)

Magic eraser tab:
  upload <file>           load a photo and resize it for painting
  brush <1-50>            set the brush size
  stroke x,y [x,y ...]    paint a freehand stroke in display coordinates
  rect x y w h            paint a filled rectangle
  clear                   remove all paint
  erase                   erase the painted area
  save [file]             save the result (default erased_photo.jpg)

  state                   show the session state
  help                    show this help
  quit                    leave the session";

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShellCommand {
    BgUpload(PathBuf),
    BgRun,
    BgSave(Option<PathBuf>),
    Upload(PathBuf),
    Brush(u32),
    Stroke(Vec<(f32, f32)>),
    Rect { x: f32, y: f32, width: f32, height: f32 },
    Clear,
    Erase,
    Save(Option<PathBuf>),
    State,
    Help,
    Quit,
}

/// Parse one input line; `Ok(None)` for blank lines and comments
pub(crate) fn parse_line(line: &str) -> std::result::Result<Option<ShellCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let optional_path = || (!rest.is_empty()).then(|| PathBuf::from(rest));
    let required_path = |usage: &str| {
        if rest.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(PathBuf::from(rest))
        }
    };

    let command = match name {
        "bg-upload" => ShellCommand::BgUpload(required_path("bg-upload <file>")?),
        "bg-run" => ShellCommand::BgRun,
        "bg-save" => ShellCommand::BgSave(optional_path()),
        "upload" => ShellCommand::Upload(required_path("upload <file>")?),
        "brush" => ShellCommand::Brush(
            rest.parse()
                .map_err(|_| "usage: brush <1-50>".to_string())?,
        ),
        "stroke" => ShellCommand::Stroke(parse_points(rest)?),
        "rect" => {
            let values = rest
                .split_whitespace()
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| "usage: rect x y w h".to_string())?;
            let [x, y, width, height] = values[..] else {
                return Err("usage: rect x y w h".to_string());
            };
            ShellCommand::Rect { x, y, width, height }
        },
        "clear" => ShellCommand::Clear,
        "erase" => ShellCommand::Erase,
        "save" => ShellCommand::Save(optional_path()),
        "state" => ShellCommand::State,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };
    Ok(Some(command))
}

fn parse_points(text: &str) -> std::result::Result<Vec<(f32, f32)>, String> {
    let usage = || "usage: stroke x,y [x,y ...]".to_string();
    let points = text
        .split_whitespace()
        .map(|pair| -> std::result::Result<(f32, f32), String> {
            let (x, y) = pair.split_once(',').ok_or_else(usage)?;
            Ok((
                x.trim().parse().map_err(|_| usage())?,
                y.trim().parse().map_err(|_| usage())?,
            ))
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;
    if points.is_empty() {
        return Err(usage());
    }
    Ok(points)
}

/// Run the session until `quit` or end of input
pub(crate) async fn run(mut session: EditorSession) -> Result<()> {
    println!("magic-photo session. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{}", Notice::Warning(message));
                continue;
            },
        };
        if command == ShellCommand::Quit {
            break;
        }
        for notice in execute(&mut session, command).await {
            println!("{notice}");
        }
    }
    Ok(())
}

async fn execute(session: &mut EditorSession, command: ShellCommand) -> Vec<Notice> {
    match command {
        ShellCommand::BgUpload(path) => match read_upload(&path).await {
            Ok((bytes, file_name)) => {
                session.handle(SessionEvent::UploadBackground { bytes, file_name })
            },
            Err(notice) => vec![notice],
        },
        ShellCommand::BgRun => {
            let spinner = spinner("Removing background...");
            let notices = session.handle(SessionEvent::RemoveBackground);
            spinner.finish_and_clear();
            notices
        },
        ShellCommand::BgSave(path) => {
            save(session.background_result(), path, BACKGROUND_REMOVED_FILE_NAME).await
        },
        ShellCommand::Upload(path) => match read_upload(&path).await {
            Ok((bytes, file_name)) => session.handle(SessionEvent::UploadEraser { bytes, file_name }),
            Err(notice) => vec![notice],
        },
        ShellCommand::Brush(size) => session.handle(SessionEvent::SetBrushSize(size)),
        ShellCommand::Stroke(points) => {
            let stroke = StrokeEvent::new(points, session.brush_size());
            session.handle(SessionEvent::Stroke(stroke))
        },
        ShellCommand::Rect { x, y, width, height } => {
            let stroke = StrokeEvent::fill_rect(x, y, width, height, session.brush_size());
            session.handle(SessionEvent::Stroke(stroke))
        },
        ShellCommand::Clear => session.handle(SessionEvent::ClearCanvas),
        ShellCommand::Erase => {
            let spinner = spinner("Erasing...");
            let notices = session.handle(SessionEvent::Erase);
            spinner.finish_and_clear();
            notices
        },
        ShellCommand::Save(path) => save(session.eraser_result(), path, ERASED_FILE_NAME).await,
        ShellCommand::State => vec![Notice::Info(describe(session))],
        ShellCommand::Help => vec![Notice::Info(HELP.to_string())],
        ShellCommand::Quit => Vec::new(),
    }
}

async fn read_upload(path: &Path) -> std::result::Result<(Vec<u8>, String), Notice> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Notice::Error(format!("Could not read {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok((bytes, file_name))
}

async fn save(result: Option<&EditResult>, path: Option<PathBuf>, default_name: &str) -> Vec<Notice> {
    let Some(result) = result else {
        return vec![Notice::Warning("Nothing to save yet".to_string())];
    };
    let path = path.unwrap_or_else(|| PathBuf::from(default_name));
    match ImageIOService::write_artifact_async(&result.artifact, &path).await {
        Ok(()) => vec![Notice::Success(format!(
            "Saved {} ({}, {} bytes)",
            path.display(),
            result.artifact.mime_type,
            result.artifact.len()
        ))],
        Err(e) => vec![Notice::Error(format!("Could not save {}: {e}", path.display()))],
    }
}

fn describe(session: &EditorSession) -> String {
    let background = match (session.background_source(), session.background_result()) {
        (None, _) => "no photo".to_string(),
        (Some(source), None) => format!("{} loaded", source.file_name),
        (Some(source), Some(result)) => {
            format!("{} done ({})", source.file_name, result.timing_summary())
        },
    };
    let canvas = session.display_image().map_or_else(String::new, |display| {
        let (width, height) = display.dimensions();
        let marked = session.current_mask().map_or(0, |mask| mask.marked_pixels());
        format!(", canvas {width}x{height}, {marked} px painted")
    });

    format!(
        "background removal: {background}\nmagic eraser: {}{canvas}, brush {}",
        session.eraser_state(),
        session.brush_size()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("upload photos/cat.jpg").unwrap(),
            Some(ShellCommand::Upload(PathBuf::from("photos/cat.jpg")))
        );
        assert_eq!(parse_line("bg-save").unwrap(), Some(ShellCommand::BgSave(None)));
        assert_eq!(parse_line("brush 20").unwrap(), Some(ShellCommand::Brush(20)));
        assert_eq!(
            parse_line("stroke 1,2 3.5,4").unwrap(),
            Some(ShellCommand::Stroke(vec![(1.0, 2.0), (3.5, 4.0)]))
        );
        assert_eq!(
            parse_line("rect 10 20 50 50").unwrap(),
            Some(ShellCommand::Rect {
                x: 10.0,
                y: 20.0,
                width: 50.0,
                height: 50.0
            })
        );
        assert_eq!(parse_line("exit").unwrap(), Some(ShellCommand::Quit));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# paint the lamp").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("upload").is_err());
        assert!(parse_line("brush big").is_err());
        assert!(parse_line("stroke 1;2").is_err());
        assert!(parse_line("stroke").is_err());
        assert!(parse_line("rect 1 2 3").is_err());
        assert!(parse_line("paint").is_err());
    }
}
