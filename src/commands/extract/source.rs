use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::cli::TextMode;
use crate::util::command_available;

/// Materialized text of one document: the flat line stream the section
/// locators consume, plus the layout-grid variant for positional passes.
/// Extraction failure degrades to empty sequences with a recorded warning,
/// never an error, so downstream sections read as absent.
#[derive(Debug, Default)]
pub(crate) struct DocumentText {
    pub(crate) lines: Vec<String>,
    pub(crate) grid: Vec<Vec<String>>,
    pub(crate) warnings: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct LineSource {
    cell_split: Regex,
}

impl LineSource {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            cell_split: Regex::new(r"\s{2,}").context("failed to compile cell-split regex")?,
        })
    }

    pub(crate) fn load(&self, path: &Path, mode: TextMode) -> DocumentText {
        let mut document = DocumentText::default();

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if !is_pdf {
            match fs::read_to_string(path) {
                Ok(text) => {
                    document.lines = to_lines(&text);
                    document.grid = self.to_grid(&text);
                }
                Err(error) => {
                    let message =
                        format!("failed to read {}: {}", path.display(), error);
                    warn!(path = %path.display(), error = %error, "text read failed");
                    document.warnings.push(message);
                }
            }
            return document;
        }

        if !command_available("pdftotext") {
            let message = format!(
                "pdftotext unavailable, no lines extracted from {}",
                path.display()
            );
            warn!(path = %path.display(), "pdftotext unavailable");
            document.warnings.push(message);
            return document;
        }

        let plain = match mode {
            TextMode::Layout => None,
            TextMode::Auto | TextMode::Plain => {
                Some(self.run_pdftotext(path, false, &mut document))
            }
        };
        let layout = match mode {
            TextMode::Plain => None,
            TextMode::Auto | TextMode::Layout => {
                Some(self.run_pdftotext(path, true, &mut document))
            }
        };

        match (plain, &layout) {
            (Some(text), _) => document.lines = to_lines(&text),
            (None, Some(text)) => document.lines = to_lines(text),
            (None, None) => {}
        }
        if let Some(text) = layout {
            document.grid = self.to_grid(&text);
        }

        document
    }

    fn run_pdftotext(&self, path: &Path, layout: bool, document: &mut DocumentText) -> String {
        let mut command = Command::new("pdftotext");
        command.arg("-q");
        if layout {
            command.arg("-layout");
        }
        command.arg(path).arg("-");

        match command.output() {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(output) => {
                let message = format!(
                    "pdftotext exited with {} for {}",
                    output.status,
                    path.display()
                );
                warn!(path = %path.display(), status = %output.status, "pdftotext failed");
                document.warnings.push(message);
                String::new()
            }
            Err(error) => {
                let message = format!("pdftotext failed for {}: {}", path.display(), error);
                warn!(path = %path.display(), error = %error, "pdftotext failed");
                document.warnings.push(message);
                String::new()
            }
        }
    }

    /// Layout-rendered lines split on runs of 2+ spaces give a cheap cell
    /// grid; column boundaries survive as spacing in the layout rendering.
    fn to_grid(&self, text: &str) -> Vec<Vec<String>> {
        text.lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let cells: Vec<String> = self
                    .cell_split
                    .split(trimmed)
                    .map(|cell| cell.trim().to_string())
                    .filter(|cell| !cell.is_empty())
                    .collect();
                if cells.is_empty() { None } else { Some(cells) }
            })
            .collect()
    }
}

fn to_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
